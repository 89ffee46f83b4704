use futures_util::stream::TryStreamExt;
use mongodb::{
    bson::{doc, oid::ObjectId},
    Client, Collection, Database,
};
use serde::Serialize;

use super::instrumented;
use super::models::{AiRequestLog, Project, SessionRecord, User, Workspace};
use crate::error::Result;
use crate::metrics::MetricsCollector;

/// Joined reads cap each related collection at the ten most recently
/// updated rows.
const RECENT_LIMIT: i64 = 10;

/// Shared database context. Constructed once per process and cloned;
/// the driver manages connection pooling underneath.
#[derive(Clone)]
pub struct MongoDbContext {
    db: Database,
    metrics: MetricsCollector,
}

#[derive(Debug, Serialize)]
pub struct UserOverview {
    pub user: User,
    pub sessions: Vec<SessionRecord>,
    pub workspaces: Vec<Workspace>,
    pub projects: Vec<Project>,
}

#[derive(Debug, Serialize)]
pub struct WorkspaceWithRelations {
    pub workspace: Workspace,
    pub owner: Option<User>,
    pub projects: Vec<Project>,
}

impl MongoDbContext {
    pub fn new(client: Client, database_name: &str, metrics: MetricsCollector) -> Self {
        Self {
            db: client.database(database_name),
            metrics,
        }
    }

    fn users(&self) -> Collection<User> {
        self.db.collection("users")
    }

    fn sessions(&self) -> Collection<SessionRecord> {
        self.db.collection("sessions")
    }

    fn workspaces(&self) -> Collection<Workspace> {
        self.db.collection("workspaces")
    }

    fn projects(&self) -> Collection<Project> {
        self.db.collection("projects")
    }

    fn ai_requests(&self) -> Collection<AiRequestLog> {
        self.db.collection("ai_request_logs")
    }

    pub async fn init_indexes(&self) -> Result<()> {
        use mongodb::options::IndexOptions;
        use mongodb::IndexModel;

        let email_index = IndexModel::builder()
            .keys(doc! { "email": 1 })
            .options(IndexOptions::builder().unique(true).build())
            .build();
        self.users().create_index(email_index).await?;

        let owner_index = IndexModel::builder().keys(doc! { "owner_id": 1 }).build();
        self.workspaces().create_index(owner_index).await?;

        let workspace_index = IndexModel::builder()
            .keys(doc! { "workspace_id": 1 })
            .build();
        self.projects().create_index(workspace_index).await?;

        let session_user_index = IndexModel::builder().keys(doc! { "user_id": 1 }).build();
        self.sessions().create_index(session_user_index).await?;

        let request_user_index = IndexModel::builder().keys(doc! { "user_id": 1 }).build();
        self.ai_requests().create_index(request_user_index).await?;

        log::info!("Database indexes created successfully");
        Ok(())
    }

    pub async fn find_user_by_id(&self, id: ObjectId) -> Result<Option<User>> {
        instrumented(
            &self.metrics,
            "find_one",
            "users",
            self.users().find_one(doc! { "_id": id }),
        )
        .await
    }

    /// Finds a user row matching the Principal's provider identity, or
    /// inserts one. Returns the row with its id populated.
    pub async fn upsert_user(&self, user: User) -> Result<User> {
        let existing = instrumented(
            &self.metrics,
            "find_one",
            "users",
            self.users().find_one(doc! { "email": &user.email }),
        )
        .await?;

        if let Some(existing) = existing {
            return Ok(existing);
        }

        let collection = self.users();
        let mut user = user;
        let insert = instrumented(
            &self.metrics,
            "insert_one",
            "users",
            async { collection.insert_one(&user).await },
        )
        .await?;
        user.id = insert.inserted_id.as_object_id();
        Ok(user)
    }

    pub async fn record_session(&self, record: SessionRecord) -> Result<()> {
        let collection = self.sessions();
        instrumented(&self.metrics, "insert_one", "sessions", async {
            collection.insert_one(&record).await
        })
        .await?;
        Ok(())
    }

    /// The user joined with their recent sessions, workspaces, and
    /// projects — each capped at ten, most recently updated first.
    pub async fn find_user_by_email(&self, email: &str) -> Result<Option<UserOverview>> {
        let user = instrumented(
            &self.metrics,
            "find_one",
            "users",
            self.users().find_one(doc! { "email": email }),
        )
        .await?;

        let Some(user) = user else {
            return Ok(None);
        };

        let Some(user_id) = user.id else {
            return Ok(Some(UserOverview {
                user,
                sessions: Vec::new(),
                workspaces: Vec::new(),
                projects: Vec::new(),
            }));
        };

        let sessions_collection = self.sessions();
        let sessions = instrumented(&self.metrics, "find", "sessions", async {
            let mut cursor = sessions_collection
                .find(doc! { "user_id": user_id })
                .sort(doc! { "updated_at": -1 })
                .limit(RECENT_LIMIT)
                .await?;
            let mut out = Vec::new();
            while let Some(record) = cursor.try_next().await? {
                out.push(record);
            }
            Ok(out)
        })
        .await?;

        let workspaces_collection = self.workspaces();
        let workspaces: Vec<Workspace> =
            instrumented(&self.metrics, "find", "workspaces", async {
                let mut cursor = workspaces_collection
                    .find(doc! { "owner_id": user_id })
                    .sort(doc! { "updated_at": -1 })
                    .limit(RECENT_LIMIT)
                    .await?;
                let mut out = Vec::new();
                while let Some(workspace) = cursor.try_next().await? {
                    out.push(workspace);
                }
                Ok(out)
            })
            .await?;

        let workspace_ids: Vec<ObjectId> =
            workspaces.iter().filter_map(|w| w.id).collect();

        let projects_collection = self.projects();
        let projects = instrumented(&self.metrics, "find", "projects", async {
            let mut cursor = projects_collection
                .find(doc! { "workspace_id": { "$in": workspace_ids } })
                .sort(doc! { "updated_at": -1 })
                .limit(RECENT_LIMIT)
                .await?;
            let mut out = Vec::new();
            while let Some(project) = cursor.try_next().await? {
                out.push(project);
            }
            Ok(out)
        })
        .await?;

        Ok(Some(UserOverview {
            user,
            sessions,
            workspaces,
            projects,
        }))
    }

    /// Inserts a workspace and reads it back joined with its owner and
    /// projects.
    pub async fn create_workspace(
        &self,
        owner_id: ObjectId,
        name: String,
    ) -> Result<WorkspaceWithRelations> {
        let collection = self.workspaces();
        let mut workspace = Workspace::new(owner_id, name);

        let insert = instrumented(&self.metrics, "insert_one", "workspaces", async {
            collection.insert_one(&workspace).await
        })
        .await?;
        workspace.id = insert.inserted_id.as_object_id();

        let owner = self.find_user_by_id(owner_id).await?;

        let projects = if let Some(workspace_id) = workspace.id {
            let projects_collection = self.projects();
            instrumented(&self.metrics, "find", "projects", async {
                let mut cursor = projects_collection
                    .find(doc! { "workspace_id": workspace_id })
                    .sort(doc! { "updated_at": -1 })
                    .limit(RECENT_LIMIT)
                    .await?;
                let mut out = Vec::new();
                while let Some(project) = cursor.try_next().await? {
                    out.push(project);
                }
                Ok(out)
            })
            .await?
        } else {
            Vec::new()
        };

        Ok(WorkspaceWithRelations {
            workspace,
            owner,
            projects,
        })
    }

    /// Appends one AI-request audit row. The completion-timestamp rule
    /// lives in `AiRequestLog::new`.
    pub async fn log_ai_request(&self, entry: AiRequestLog) -> Result<AiRequestLog> {
        let collection = self.ai_requests();
        let mut entry = entry;

        let insert = instrumented(&self.metrics, "insert_one", "ai_request_logs", async {
            collection.insert_one(&entry).await
        })
        .await?;
        entry.id = insert.inserted_id.as_object_id();

        Ok(entry)
    }
}
