//! Create user privacy table migration.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(UserPrivacy::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(UserPrivacy::UserId)
                            .string_len(32)
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(UserPrivacy::IsPrivate)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(UserPrivacy::AllowMessagesFrom)
                            .string_len(16)
                            .not_null()
                            .default("everyone"),
                    )
                    .col(
                        ColumnDef::new(UserPrivacy::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_user_privacy_user")
                            .from(UserPrivacy::Table, UserPrivacy::UserId)
                            .to(User::Table, User::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(UserPrivacy::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum UserPrivacy {
    Table,
    UserId,
    IsPrivate,
    AllowMessagesFrom,
    UpdatedAt,
}

#[derive(Iden)]
enum User {
    Table,
    Id,
}
