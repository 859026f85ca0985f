//! Migration to create the seismic_reports table.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(SeismicReports::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(SeismicReports::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(SeismicReports::Timestamp)
                            .big_integer()
                            .not_null()
                            .unique_key(),
                    )
                    .col(
                        ColumnDef::new(SeismicReports::Geometry)
                            .json_binary()
                            .not_null(),
                    )
                    .col(ColumnDef::new(SeismicReports::Scale).double().not_null())
                    .col(
                        ColumnDef::new(SeismicReports::Intensity)
                            .json_binary()
                            .not_null(),
                    )
                    .col(ColumnDef::new(SeismicReports::Link).text().not_null())
                    .col(ColumnDef::new(SeismicReports::Img).text().not_null())
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(SeismicReports::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum SeismicReports {
    Table,
    Id,
    Timestamp,
    Geometry,
    Scale,
    Intensity,
    Link,
    Img,
}
