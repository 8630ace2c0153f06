use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::TryStreamExt;
use mongodb::{
    bson::{self, doc, Document},
    error::{ErrorKind, WriteFailure},
    options::IndexOptions,
    Client as MongoClient, Collection, Database, IndexModel,
};
use serde::{Deserialize, Serialize};
use service_core::error::AppError;
use std::collections::HashMap;

use super::{
    PermissionRepository, RepositoryError, RoleFilter, RoleRepository, TokenRepository,
    UserRepository,
};
use crate::models::{Permission, Role, Token, TokenType, User};

const DUPLICATE_KEY_CODE: i32 = 11000;

/// MongoDB-backed store implementing every repository capability.
#[derive(Clone)]
pub struct MongoStore {
    client: MongoClient,
    db: Database,
}

/// Token record as stored; timestamps are BSON dates so expiry can be queried.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct TokenDocument {
    #[serde(rename = "_id")]
    id: String,
    user_id: String,
    token_type: TokenType,
    token_value: String,
    created_at: bson::DateTime,
    expires_at: Option<bson::DateTime>,
}

impl From<&Token> for TokenDocument {
    fn from(token: &Token) -> Self {
        Self {
            id: token.id.clone(),
            user_id: token.user_id.clone(),
            token_type: token.token_type,
            token_value: token.token_value.clone(),
            created_at: bson::DateTime::from_millis(token.created_at.timestamp_millis()),
            expires_at: token
                .expires_at
                .map(|t| bson::DateTime::from_millis(t.timestamp_millis())),
        }
    }
}

impl From<TokenDocument> for Token {
    fn from(doc: TokenDocument) -> Self {
        Self {
            id: doc.id,
            user_id: doc.user_id,
            token_type: doc.token_type,
            token_value: doc.token_value,
            created_at: from_bson_date(doc.created_at),
            expires_at: doc.expires_at.map(from_bson_date),
        }
    }
}

fn from_bson_date(date: bson::DateTime) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(date.timestamp_millis()).unwrap_or_default()
}

fn map_write_error(e: mongodb::error::Error) -> RepositoryError {
    if let ErrorKind::Write(WriteFailure::WriteError(ref write_error)) = *e.kind {
        if write_error.code == DUPLICATE_KEY_CODE {
            return RepositoryError::Duplicate;
        }
    }
    RepositoryError::Database(e)
}

fn token_key(token_type: TokenType, value: &str) -> Document {
    doc! { "token_type": token_type.as_str(), "token_value": value }
}

fn token_owner(token_type: TokenType, user_id: &str) -> Document {
    doc! { "token_type": token_type.as_str(), "user_id": user_id }
}

impl MongoStore {
    pub async fn connect(uri: &str, database: &str) -> Result<Self, AppError> {
        tracing::info!("Connecting to MongoDB");
        let client = MongoClient::with_uri_str(uri).await.map_err(|e| {
            tracing::error!("Failed to connect to MongoDB: {}", e);
            AppError::from(e)
        })?;
        let db = client.database(database);
        tracing::info!(database = %database, "Successfully connected to MongoDB database");
        Ok(Self { client, db })
    }

    pub async fn initialize_indexes(&self) -> Result<(), AppError> {
        tracing::info!("Creating MongoDB indexes for rbac-service");

        // Token values are unique per type; lookups always go through this pair.
        let token_value_index = IndexModel::builder()
            .keys(doc! { "token_type": 1, "token_value": 1 })
            .options(
                IndexOptions::builder()
                    .name("token_value_lookup".to_string())
                    .unique(true)
                    .build(),
            )
            .build();

        let token_owner_index = IndexModel::builder()
            .keys(doc! { "token_type": 1, "user_id": 1 })
            .options(
                IndexOptions::builder()
                    .name("token_owner_lookup".to_string())
                    .build(),
            )
            .build();

        let token_expiry_index = IndexModel::builder()
            .keys(doc! { "expires_at": 1 })
            .options(
                IndexOptions::builder()
                    .name("token_expiry".to_string())
                    .build(),
            )
            .build();

        self.tokens()
            .create_indexes(
                vec![token_value_index, token_owner_index, token_expiry_index],
                None,
            )
            .await
            .map_err(|e| {
                tracing::error!("Failed to create indexes on tokens collection: {}", e);
                AppError::from(e)
            })?;
        tracing::info!("Created indexes on tokens");

        let role_name_index = IndexModel::builder()
            .keys(doc! { "name": 1, "organization_id": 1 })
            .options(
                IndexOptions::builder()
                    .name("role_name_lookup".to_string())
                    .build(),
            )
            .build();

        self.roles()
            .create_index(role_name_index, None)
            .await
            .map_err(|e| {
                tracing::error!("Failed to create name index on roles collection: {}", e);
                AppError::from(e)
            })?;
        tracing::info!("Created index on roles.(name, organization_id)");

        Ok(())
    }

    pub async fn health_check(&self) -> Result<(), AppError> {
        self.client
            .database("admin")
            .run_command(doc! { "ping": 1 }, None)
            .await
            .map_err(|e| {
                tracing::error!("MongoDB health check failed: {}", e);
                AppError::from(e)
            })?;
        Ok(())
    }

    pub fn users(&self) -> Collection<User> {
        self.db.collection("users")
    }

    pub fn roles(&self) -> Collection<Role> {
        self.db.collection("roles")
    }

    pub fn permissions(&self) -> Collection<Permission> {
        self.db.collection("permissions")
    }

    fn tokens(&self) -> Collection<TokenDocument> {
        self.db.collection("tokens")
    }
}

#[async_trait]
impl UserRepository for MongoStore {
    async fn find_by_id(&self, id: &str) -> Result<Option<User>, RepositoryError> {
        Ok(self.users().find_one(doc! { "_id": id }, None).await?)
    }
}

#[async_trait]
impl RoleRepository for MongoStore {
    async fn find_by_id(&self, id: &str) -> Result<Option<Role>, RepositoryError> {
        Ok(self.roles().find_one(doc! { "_id": id }, None).await?)
    }

    async fn find_many(&self, filter: &RoleFilter) -> Result<Vec<Role>, RepositoryError> {
        let mut query = Document::new();
        if let Some(name) = &filter.name {
            query.insert("name", name.as_str());
        }
        if let Some(org) = &filter.organization_id {
            query.insert("organization_id", org.as_str());
        }
        let cursor = self.roles().find(query, None).await?;
        Ok(cursor.try_collect().await?)
    }

    async fn insert(&self, role: &Role) -> Result<(), RepositoryError> {
        self.roles()
            .insert_one(role, None)
            .await
            .map_err(map_write_error)?;
        Ok(())
    }

    async fn update(&self, role: &Role) -> Result<bool, RepositoryError> {
        let result = self
            .roles()
            .replace_one(doc! { "_id": role.id.as_str() }, role, None)
            .await
            .map_err(map_write_error)?;
        Ok(result.matched_count > 0)
    }

    async fn delete(&self, id: &str) -> Result<bool, RepositoryError> {
        let result = self.roles().delete_one(doc! { "_id": id }, None).await?;
        Ok(result.deleted_count > 0)
    }
}

#[async_trait]
impl PermissionRepository for MongoStore {
    async fn find_by_id(&self, id: &str) -> Result<Option<Permission>, RepositoryError> {
        Ok(self.permissions().find_one(doc! { "_id": id }, None).await?)
    }

    async fn find_by_ids(&self, ids: &[String]) -> Result<Vec<Permission>, RepositoryError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let cursor = self
            .permissions()
            .find(doc! { "_id": { "$in": ids.to_vec() } }, None)
            .await?;
        let found: Vec<Permission> = cursor.try_collect().await?;

        let mut by_id: HashMap<String, Permission> =
            found.into_iter().map(|p| (p.id.clone(), p)).collect();
        Ok(ids.iter().filter_map(|id| by_id.remove(id)).collect())
    }

    async fn insert(&self, permission: &Permission) -> Result<(), RepositoryError> {
        self.permissions()
            .insert_one(permission, None)
            .await
            .map_err(map_write_error)?;
        Ok(())
    }
}

#[async_trait]
impl TokenRepository for MongoStore {
    async fn store_token(&self, token: &Token) -> Result<(), RepositoryError> {
        self.tokens()
            .insert_one(TokenDocument::from(token), None)
            .await
            .map_err(map_write_error)?;
        Ok(())
    }

    async fn find_token_by_value(
        &self,
        token_type: TokenType,
        value: &str,
    ) -> Result<Option<Token>, RepositoryError> {
        let found = self
            .tokens()
            .find_one(token_key(token_type, value), None)
            .await?;
        Ok(found.map(Token::from))
    }

    async fn find_tokens_by_user(
        &self,
        token_type: TokenType,
        user_id: &str,
    ) -> Result<Vec<Token>, RepositoryError> {
        let cursor = self
            .tokens()
            .find(token_owner(token_type, user_id), None)
            .await?;
        let docs: Vec<TokenDocument> = cursor.try_collect().await?;
        Ok(docs.into_iter().map(Token::from).collect())
    }

    async fn delete_token(
        &self,
        token_type: TokenType,
        value: &str,
    ) -> Result<bool, RepositoryError> {
        let result = self
            .tokens()
            .delete_one(token_key(token_type, value), None)
            .await?;
        Ok(result.deleted_count > 0)
    }

    async fn delete_tokens_by_user(
        &self,
        token_type: TokenType,
        user_id: &str,
    ) -> Result<u64, RepositoryError> {
        let result = self
            .tokens()
            .delete_many(token_owner(token_type, user_id), None)
            .await?;
        Ok(result.deleted_count)
    }

    async fn delete_expired_tokens(&self) -> Result<u64, RepositoryError> {
        let result = self
            .tokens()
            .delete_many(doc! { "expires_at": { "$lt": bson::DateTime::now() } }, None)
            .await?;
        Ok(result.deleted_count)
    }

    async fn consume_token(
        &self,
        token_type: TokenType,
        value: &str,
    ) -> Result<Option<Token>, RepositoryError> {
        let found = self
            .tokens()
            .find_one_and_delete(token_key(token_type, value), None)
            .await?;
        Ok(found.map(Token::from))
    }
}
