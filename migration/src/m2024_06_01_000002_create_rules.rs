//! Migration to create the rules table.
//!
//! `last_triggered_by` holds the unix timestamp of the source record that last
//! produced an issue for the rule; NULL means the rule never fired.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Rules::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Rules::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Rules::UserId).integer().not_null())
                    .col(ColumnDef::new(Rules::Name).text().null())
                    .col(ColumnDef::new(Rules::Position).text().not_null())
                    .col(ColumnDef::new(Rules::Resource).text().not_null())
                    .col(ColumnDef::new(Rules::Operator).text().not_null())
                    .col(ColumnDef::new(Rules::Value).double().not_null())
                    .col(
                        ColumnDef::new(Rules::IsEnable)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .col(ColumnDef::new(Rules::LastTriggeredBy).big_integer().null())
                    .col(
                        ColumnDef::new(Rules::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(Rules::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_rules_user_id")
                            .from(Rules::Table, Rules::UserId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_rules_user_id")
                    .table(Rules::Table)
                    .col(Rules::UserId)
                    .to_owned(),
            )
            .await?;

        // The trigger pass scans enabled rules every tick.
        manager
            .create_index(
                Index::create()
                    .name("idx_rules_is_enable")
                    .table(Rules::Table)
                    .col(Rules::IsEnable)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_index(Index::drop().name("idx_rules_is_enable").to_owned())
            .await?;
        manager
            .drop_index(Index::drop().name("idx_rules_user_id").to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Rules::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum Rules {
    Table,
    Id,
    UserId,
    Name,
    Position,
    Resource,
    Operator,
    Value,
    IsEnable,
    LastTriggeredBy,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum Users {
    Table,
    Id,
}
