//! Migration to create the reservoir_reports table.
//!
//! One row per dam per observation. Storage and percent are `-1` when the
//! upstream source had no reading.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(ReservoirReports::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(ReservoirReports::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(ReservoirReports::Name).text().not_null())
                    .col(
                        ColumnDef::new(ReservoirReports::Timestamp)
                            .big_integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(ReservoirReports::Storage).double().not_null())
                    .col(ColumnDef::new(ReservoirReports::Percent).double().not_null())
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("uq_reservoir_reports_name_timestamp")
                    .table(ReservoirReports::Table)
                    .col(ReservoirReports::Name)
                    .col(ReservoirReports::Timestamp)
                    .unique()
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_index(
                Index::drop()
                    .name("uq_reservoir_reports_name_timestamp")
                    .to_owned(),
            )
            .await?;
        manager
            .drop_table(Table::drop().table(ReservoirReports::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum ReservoirReports {
    Table,
    Id,
    Name,
    Timestamp,
    Storage,
    Percent,
}
