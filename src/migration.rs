use sea_orm_migration::prelude::*;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![Box::new(Migration001CreateTables)]
    }
}

pub struct Migration001CreateTables;

impl MigrationName for Migration001CreateTables {
    fn name(&self) -> &str {
        "m001_create_tables"
    }
}

#[async_trait::async_trait]
impl MigrationTrait for Migration001CreateTables {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // email_accounts table (sender identities)
        manager
            .create_table(
                Table::create()
                    .table(EmailAccounts::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(EmailAccounts::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(EmailAccounts::Email)
                            .string_len(255)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(EmailAccounts::Name)
                            .string_len(255)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(EmailAccounts::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        // email_templates table
        manager
            .create_table(
                Table::create()
                    .table(EmailTemplates::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(EmailTemplates::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(EmailTemplates::Name)
                            .string_len(255)
                            .not_null(),
                    )
                    .col(ColumnDef::new(EmailTemplates::Subject).text().not_null())
                    .col(ColumnDef::new(EmailTemplates::Body).text().not_null())
                    .col(
                        ColumnDef::new(EmailTemplates::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(EmailTemplates::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(EmailAccounts::Table).to_owned())
            .await?;
        Ok(())
    }
}

// ========== Table identifiers ==========

#[derive(Iden)]
enum EmailAccounts {
    Table,
    Id,
    Email,
    Name,
    CreatedAt,
}

#[derive(Iden)]
enum EmailTemplates {
    Table,
    Id,
    Name,
    Subject,
    Body,
    CreatedAt,
}
