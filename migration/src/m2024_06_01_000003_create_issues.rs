//! Migration to create the issues table.
//!
//! `rule_id` carries no foreign key: deleting a rule keeps its
//! issues, which then reference a rule that no longer resolves.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Issues::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Issues::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Issues::UserId).integer().not_null())
                    .col(ColumnDef::new(Issues::RuleId).integer().not_null())
                    .col(ColumnDef::new(Issues::Title).text().not_null())
                    .col(ColumnDef::new(Issues::Content).text().not_null())
                    .col(
                        ColumnDef::new(Issues::Status)
                            .text()
                            .not_null()
                            .default("CREATED"),
                    )
                    .col(
                        ColumnDef::new(Issues::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(Issues::ProcessingAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(Issues::SolvedAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(Issues::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_issues_user_id")
                            .from(Issues::Table, Issues::UserId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_issues_user_status")
                    .table(Issues::Table)
                    .col(Issues::UserId)
                    .col(Issues::Status)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_issues_rule_id")
                    .table(Issues::Table)
                    .col(Issues::RuleId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_index(Index::drop().name("idx_issues_rule_id").to_owned())
            .await?;
        manager
            .drop_index(Index::drop().name("idx_issues_user_status").to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Issues::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum Issues {
    Table,
    Id,
    UserId,
    RuleId,
    Title,
    Content,
    Status,
    CreatedAt,
    ProcessingAt,
    SolvedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum Users {
    Table,
    Id,
}
