//! Migration to create the grid_reports table.
//!
//! Each regional column stores `{load, max_supply, recv_rate}` as JSON.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(GridReports::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(GridReports::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(GridReports::Timestamp)
                            .big_integer()
                            .not_null()
                            .unique_key(),
                    )
                    .col(ColumnDef::new(GridReports::East).json_binary().not_null())
                    .col(ColumnDef::new(GridReports::South).json_binary().not_null())
                    .col(ColumnDef::new(GridReports::Central).json_binary().not_null())
                    .col(ColumnDef::new(GridReports::North).json_binary().not_null())
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(GridReports::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum GridReports {
    Table,
    Id,
    Timestamp,
    East,
    South,
    Central,
    North,
}
