use crate::entities::prelude::*;
use crate::entities::{api_keys, notes};
use sea_orm_migration::prelude::*;
use sea_orm_migration::sea_orm::{ConnectionTrait, Schema};

#[derive(DeriveMigrationName)]
pub struct Migration;

/// At most one live active key per user. A plain unique index cannot express
/// this, so the statement is issued as raw SQL.
const ONE_ACTIVE_KEY_INDEX: &str = "CREATE UNIQUE INDEX IF NOT EXISTS idx_api_keys_one_active \
     ON api_keys (user_id) WHERE is_active = 1 AND deleted_at IS NULL";

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let backend = manager.get_database_backend();
        let schema = Schema::new(backend);

        manager
            .create_table(
                schema
                    .create_table_from_entity(Users)
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                schema
                    .create_table_from_entity(ApiKeys)
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                schema
                    .create_table_from_entity(UserSettings)
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                schema
                    .create_table_from_entity(Notes)
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                schema
                    .create_table_from_entity(Bloggers)
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_api_keys_user_id")
                    .table(ApiKeys)
                    .col(api_keys::Column::UserId)
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_notes_user_created")
                    .table(Notes)
                    .col(notes::Column::UserId)
                    .col(notes::Column::CreatedAt)
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;

        manager
            .get_connection()
            .execute_unprepared(ONE_ACTIVE_KEY_INDEX)
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Bloggers).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Notes).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(UserSettings).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(ApiKeys).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Users).to_owned())
            .await?;

        Ok(())
    }
}
