//! Create message and message read tables migration.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Message::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Message::Id)
                            .string_len(32)
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(Message::ConversationId)
                            .string_len(32)
                            .not_null(),
                    )
                    .col(ColumnDef::new(Message::SenderId).string_len(32).not_null())
                    .col(ColumnDef::new(Message::Content).text().not_null())
                    .col(
                        ColumnDef::new(Message::MessageType)
                            .string_len(16)
                            .not_null()
                            .default("text"),
                    )
                    .col(ColumnDef::new(Message::StoryId).string_len(32))
                    .col(ColumnDef::new(Message::StoryThumbnail).string_len(1024))
                    .col(ColumnDef::new(Message::StoryAuthorId).string_len(32))
                    .col(
                        ColumnDef::new(Message::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_message_conversation")
                            .from(Message::Table, Message::ConversationId)
                            .to(Conversation::Table, Conversation::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_message_sender")
                            .from(Message::Table, Message::SenderId)
                            .to(User::Table, User::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    // Replies outlive the story they answer
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_message_story")
                            .from(Message::Table, Message::StoryId)
                            .to(Story::Table, Story::Id)
                            .on_delete(ForeignKeyAction::SetNull),
                    )
                    .to_owned(),
            )
            .await?;

        // Index: (conversation_id, created_at) (for history)
        manager
            .create_index(
                Index::create()
                    .name("idx_message_conversation_created_at")
                    .table(Message::Table)
                    .col(Message::ConversationId)
                    .col(Message::CreatedAt)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(MessageRead::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(MessageRead::Id)
                            .string_len(32)
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(MessageRead::MessageId).string_len(32).not_null())
                    .col(ColumnDef::new(MessageRead::UserId).string_len(32).not_null())
                    .col(
                        ColumnDef::new(MessageRead::ReadAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_message_read_message")
                            .from(MessageRead::Table, MessageRead::MessageId)
                            .to(Message::Table, Message::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_message_read_user")
                            .from(MessageRead::Table, MessageRead::UserId)
                            .to(User::Table, User::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // Unique index: exactly one receipt per (message, reader)
        manager
            .create_index(
                Index::create()
                    .name("idx_message_read_message_user")
                    .table(MessageRead::Table)
                    .col(MessageRead::MessageId)
                    .col(MessageRead::UserId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(MessageRead::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Message::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum Message {
    Table,
    Id,
    ConversationId,
    SenderId,
    Content,
    MessageType,
    StoryId,
    StoryThumbnail,
    StoryAuthorId,
    CreatedAt,
}

#[derive(Iden)]
enum MessageRead {
    Table,
    Id,
    MessageId,
    UserId,
    ReadAt,
}

#[derive(Iden)]
enum Conversation {
    Table,
    Id,
}

#[derive(Iden)]
enum Story {
    Table,
    Id,
}

#[derive(Iden)]
enum User {
    Table,
    Id,
}
