//! Database repository for incident, comment and upvote operations.
//!
//! Uses prepared statements and transactions for data integrity.

use std::collections::BTreeMap;

use sqlx::{QueryBuilder, Row, Sqlite, SqlitePool};

use crate::errors::AppError;
use crate::models::{
    timestamp_now, Comment, CreateCommentRequest, CreateIncidentRequest, DailyCount, Incident,
    IncidentCategory, IncidentQuery, IncidentStats, Severity,
};

const INCIDENT_COLUMNS: &str = r#"SELECT i.id, i.latitude, i.longitude, i.category, i.severity,
       i.summary, i.address, i.description, i.timestamp, i.upvotes,
       (SELECT COUNT(*) FROM comments c WHERE c.incident_id = i.id) AS comment_count
  FROM incidents i"#;

/// Database repository for all data operations.
#[derive(Clone)]
pub struct Repository {
    pool: SqlitePool,
}

impl Repository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    // ==================== INCIDENT OPERATIONS ====================

    /// Insert a new incident. The timestamp is assigned here, never by the caller.
    pub async fn create_incident(&self, request: &CreateIncidentRequest) -> Result<Incident, AppError> {
        let id = uuid::Uuid::new_v4().to_string();
        let now = timestamp_now();
        let address = non_blank(request.address.as_deref());
        let description = non_blank(request.description.as_deref());

        sqlx::query(
            r#"INSERT INTO incidents (
                id, latitude, longitude, category, severity, summary,
                address, description, timestamp, upvotes
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, 0)"#,
        )
        .bind(&id)
        .bind(request.latitude)
        .bind(request.longitude)
        .bind(request.category.as_str())
        .bind(request.severity.as_str())
        .bind(request.summary.trim())
        .bind(&address)
        .bind(&description)
        .bind(&now)
        .execute(&self.pool)
        .await?;

        tracing::info!(
            incident_id = %id,
            category = request.category.as_str(),
            severity = request.severity.as_str(),
            "Incident created"
        );

        Ok(Incident {
            id,
            latitude: request.latitude,
            longitude: request.longitude,
            category: request.category,
            severity: request.severity,
            summary: request.summary.trim().to_string(),
            address,
            description,
            timestamp: now,
            upvotes: 0,
            comment_count: 0,
        })
    }

    /// Get an incident by ID.
    pub async fn get_incident(&self, id: &str) -> Result<Option<Incident>, AppError> {
        let row = sqlx::query(&format!("{} WHERE i.id = ?", INCIDENT_COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.as_ref().map(incident_from_row))
    }

    /// List incidents, newest first, at most `query.effective_limit()` of them.
    pub async fn list_incidents(&self, query: &IncidentQuery) -> Result<Vec<Incident>, AppError> {
        self.select_incidents(query, Some(query.effective_limit()))
            .await
    }

    /// Every incident matching the filters, newest first. `limit` is ignored.
    ///
    /// Used for route matching, where the bounds and time window already keep
    /// the result small and truncation would hide incidents on the route.
    pub async fn list_all_incidents(&self, query: &IncidentQuery) -> Result<Vec<Incident>, AppError> {
        self.select_incidents(query, None).await
    }

    async fn select_incidents(
        &self,
        query: &IncidentQuery,
        limit: Option<i64>,
    ) -> Result<Vec<Incident>, AppError> {
        let bounds = query.bounds().map_err(AppError::Validation)?;
        let since = query.since().map_err(AppError::Validation)?;

        let mut qb = QueryBuilder::<Sqlite>::new(INCIDENT_COLUMNS);
        qb.push(" WHERE 1 = 1");

        if let Some(category) = query.category {
            qb.push(" AND i.category = ").push_bind(category.as_str());
        }
        if let Some(severity) = query.severity {
            qb.push(" AND i.severity = ").push_bind(severity.as_str());
        }
        if let Some(since) = since {
            qb.push(" AND i.timestamp >= ").push_bind(since);
        }
        if let Some(b) = bounds {
            qb.push(" AND i.latitude BETWEEN ")
                .push_bind(b.min_lat)
                .push(" AND ")
                .push_bind(b.max_lat);
            if b.min_lng <= b.max_lng {
                qb.push(" AND i.longitude BETWEEN ")
                    .push_bind(b.min_lng)
                    .push(" AND ")
                    .push_bind(b.max_lng);
            } else {
                // Viewport crosses the antimeridian
                qb.push(" AND (i.longitude >= ")
                    .push_bind(b.min_lng)
                    .push(" OR i.longitude <= ")
                    .push_bind(b.max_lng)
                    .push(")");
            }
        }

        qb.push(" ORDER BY i.timestamp DESC, i.rowid DESC");
        if let Some(limit) = limit {
            qb.push(" LIMIT ").push_bind(limit);
        }

        let rows = qb.build().fetch_all(&self.pool).await?;
        Ok(rows.iter().map(incident_from_row).collect())
    }

    /// Delete an incident together with its comments.
    pub async fn delete_incident(&self, id: &str) -> Result<(), AppError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM comments WHERE incident_id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        let result = sqlx::query("DELETE FROM incidents WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Incident {} not found", id)));
        }

        tx.commit().await?;
        tracing::info!(incident_id = %id, "Incident deleted");
        Ok(())
    }

    /// Atomically add one upvote and return the new count.
    ///
    /// The increment happens inside a single UPDATE, so concurrent upvotes
    /// never overwrite each other.
    pub async fn upvote_incident(&self, id: &str) -> Result<i64, AppError> {
        let row = sqlx::query(
            "UPDATE incidents SET upvotes = upvotes + 1 WHERE id = ? RETURNING upvotes",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| r.get::<i64, _>("upvotes"))
            .ok_or_else(|| AppError::NotFound(format!("Incident {} not found", id)))
    }

    // ==================== COMMENT OPERATIONS ====================

    async fn ensure_incident_exists(&self, id: &str) -> Result<(), AppError> {
        let exists = sqlx::query("SELECT 1 FROM incidents WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .is_some();

        if exists {
            Ok(())
        } else {
            Err(AppError::NotFound(format!("Incident {} not found", id)))
        }
    }

    /// Add a comment to an incident.
    pub async fn add_comment(
        &self,
        incident_id: &str,
        request: &CreateCommentRequest,
    ) -> Result<Comment, AppError> {
        self.ensure_incident_exists(incident_id).await?;

        let id = uuid::Uuid::new_v4().to_string();
        let now = timestamp_now();
        let author = request.author_or_anonymous();
        let text = request.text.trim().to_string();

        sqlx::query(
            "INSERT INTO comments (id, incident_id, text, author, timestamp) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&id)
        .bind(incident_id)
        .bind(&text)
        .bind(&author)
        .bind(&now)
        .execute(&self.pool)
        .await?;

        Ok(Comment {
            id,
            incident_id: incident_id.to_string(),
            text,
            author,
            timestamp: now,
        })
    }

    /// List the comments of an incident, oldest first.
    pub async fn list_comments(&self, incident_id: &str) -> Result<Vec<Comment>, AppError> {
        self.ensure_incident_exists(incident_id).await?;

        let rows = sqlx::query(
            "SELECT id, incident_id, text, author, timestamp FROM comments WHERE incident_id = ? ORDER BY timestamp, rowid",
        )
        .bind(incident_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(comment_from_row).collect())
    }

    // ==================== ANALYTICS ====================

    /// Aggregate incidents reported at or after `since`.
    pub async fn incident_stats(&self, since: &str) -> Result<IncidentStats, AppError> {
        let totals = sqlx::query(
            "SELECT COUNT(*) AS total, COALESCE(SUM(upvotes), 0) AS upvotes FROM incidents WHERE timestamp >= ?",
        )
        .bind(since)
        .fetch_one(&self.pool)
        .await?;

        let mut by_category: BTreeMap<IncidentCategory, i64> =
            IncidentCategory::ALL.iter().map(|c| (*c, 0)).collect();
        let rows = sqlx::query(
            "SELECT category, COUNT(*) AS count FROM incidents WHERE timestamp >= ? GROUP BY category",
        )
        .bind(since)
        .fetch_all(&self.pool)
        .await?;
        for row in rows {
            let category: String = row.get("category");
            let category = category.parse().unwrap_or(IncidentCategory::Other);
            *by_category.entry(category).or_default() += row.get::<i64, _>("count");
        }

        let mut by_severity: BTreeMap<Severity, i64> =
            Severity::ALL.iter().map(|s| (*s, 0)).collect();
        let rows = sqlx::query(
            "SELECT severity, COUNT(*) AS count FROM incidents WHERE timestamp >= ? GROUP BY severity",
        )
        .bind(since)
        .fetch_all(&self.pool)
        .await?;
        for row in rows {
            let severity: String = row.get("severity");
            let severity = severity.parse().unwrap_or(Severity::Medium);
            *by_severity.entry(severity).or_default() += row.get::<i64, _>("count");
        }

        let daily = sqlx::query(
            r#"SELECT substr(timestamp, 1, 10) AS day, COUNT(*) AS count
                 FROM incidents WHERE timestamp >= ?
                GROUP BY day ORDER BY day"#,
        )
        .bind(since)
        .fetch_all(&self.pool)
        .await?
        .iter()
        .map(|row| DailyCount {
            date: row.get("day"),
            count: row.get("count"),
        })
        .collect();

        Ok(IncidentStats {
            since: since.to_string(),
            total: totals.get("total"),
            total_upvotes: totals.get("upvotes"),
            by_category,
            by_severity,
            daily,
        })
    }
}

// Helper functions for row conversion

fn incident_from_row(row: &sqlx::sqlite::SqliteRow) -> Incident {
    let category: String = row.get("category");
    let severity: String = row.get("severity");
    Incident {
        id: row.get("id"),
        latitude: row.get("latitude"),
        longitude: row.get("longitude"),
        category: category.parse().unwrap_or(IncidentCategory::Other),
        severity: severity.parse().unwrap_or(Severity::Medium),
        summary: row.get("summary"),
        address: row.get("address"),
        description: row.get("description"),
        timestamp: row.get("timestamp"),
        upvotes: row.get("upvotes"),
        comment_count: row.get("comment_count"),
    }
}

fn comment_from_row(row: &sqlx::sqlite::SqliteRow) -> Comment {
    Comment {
        id: row.get("id"),
        incident_id: row.get("incident_id"),
        text: row.get("text"),
        author: row.get("author"),
        timestamp: row.get("timestamp"),
    }
}

fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_database;
    use crate::models::{IncidentQuery, MAX_LIST_LIMIT};
    use tempfile::TempDir;

    async fn repo() -> (Repository, TempDir) {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let pool = init_database(&temp_dir.path().join("test.sqlite"))
            .await
            .expect("Failed to init DB");
        (Repository::new(pool), temp_dir)
    }

    fn request(category: IncidentCategory, lat: f64, lng: f64) -> CreateIncidentRequest {
        CreateIncidentRequest {
            latitude: lat,
            longitude: lng,
            category,
            severity: Severity::High,
            summary: format!("{} reported", category.as_str()),
            address: Some("  ".to_string()),
            description: None,
        }
    }

    #[tokio::test]
    async fn test_create_assigns_server_fields() {
        let (repo, _dir) = repo().await;
        let before = timestamp_now();
        let incident = repo
            .create_incident(&request(IncidentCategory::Flooding, 12.97, 77.59))
            .await
            .unwrap();

        assert_eq!(incident.upvotes, 0);
        assert!(incident.timestamp >= before);
        assert_eq!(incident.address, None);

        let stored = repo.get_incident(&incident.id).await.unwrap().unwrap();
        assert_eq!(stored.timestamp, incident.timestamp);
        assert_eq!(stored.category, IncidentCategory::Flooding);
    }

    #[tokio::test]
    async fn test_concurrent_upvotes_are_not_lost() {
        let (repo, _dir) = repo().await;
        let incident = repo
            .create_incident(&request(IncidentCategory::Fire, 1.0, 1.0))
            .await
            .unwrap();

        let handles: Vec<_> = (0..20)
            .map(|_| {
                let repo = repo.clone();
                let id = incident.id.clone();
                tokio::spawn(async move { repo.upvote_incident(&id).await.unwrap() })
            })
            .collect();

        let mut counts = Vec::new();
        for handle in handles {
            counts.push(handle.await.unwrap());
        }
        counts.sort_unstable();
        assert_eq!(counts, (1..=20).collect::<Vec<i64>>());

        let stored = repo.get_incident(&incident.id).await.unwrap().unwrap();
        assert_eq!(stored.upvotes, 20);
    }

    #[tokio::test]
    async fn test_upvote_missing_incident() {
        let (repo, _dir) = repo().await;
        let err = repo.upvote_incident("missing").await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_list_filters_by_bounds_and_category() {
        let (repo, _dir) = repo().await;
        repo.create_incident(&request(IncidentCategory::Flooding, 10.0, 10.0))
            .await
            .unwrap();
        repo.create_incident(&request(IncidentCategory::Fire, 10.5, 10.5))
            .await
            .unwrap();
        repo.create_incident(&request(IncidentCategory::Flooding, 40.0, 40.0))
            .await
            .unwrap();

        let in_view = repo
            .list_incidents(&IncidentQuery {
                min_lat: Some(9.0),
                max_lat: Some(11.0),
                min_lng: Some(9.0),
                max_lng: Some(11.0),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(in_view.len(), 2);
        // Newest first
        assert_eq!(in_view[0].category, IncidentCategory::Fire);

        let floods = repo
            .list_incidents(&IncidentQuery {
                category: Some(IncidentCategory::Flooding),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(floods.len(), 2);
    }

    #[tokio::test]
    async fn test_list_all_ignores_page_limit() {
        let (repo, _dir) = repo().await;
        let total = MAX_LIST_LIMIT as usize + 5;
        for n in 0..total {
            let lat = 10.0 + (n as f64) * 0.0001;
            repo.create_incident(&request(IncidentCategory::RoadClosure, lat, 10.0))
                .await
                .unwrap();
        }
        let area = IncidentQuery {
            min_lat: Some(9.0),
            max_lat: Some(11.0),
            min_lng: Some(9.0),
            max_lng: Some(11.0),
            since_hours: Some(24),
            limit: Some(MAX_LIST_LIMIT),
            ..Default::default()
        };

        let page = repo.list_incidents(&area).await.unwrap();
        assert_eq!(page.len(), MAX_LIST_LIMIT as usize);

        let all = repo.list_all_incidents(&area).await.unwrap();
        assert_eq!(all.len(), total);
    }

    #[tokio::test]
    async fn test_antimeridian_viewport() {
        let (repo, _dir) = repo().await;
        repo.create_incident(&request(IncidentCategory::Other, 0.0, 179.5))
            .await
            .unwrap();
        repo.create_incident(&request(IncidentCategory::Other, 0.0, -179.5))
            .await
            .unwrap();
        repo.create_incident(&request(IncidentCategory::Other, 0.0, 0.0))
            .await
            .unwrap();

        let wrapped = repo
            .list_incidents(&IncidentQuery {
                min_lat: Some(-1.0),
                max_lat: Some(1.0),
                min_lng: Some(179.0),
                max_lng: Some(-179.0),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(wrapped.len(), 2);
    }

    #[tokio::test]
    async fn test_comments_and_cascade_delete() {
        let (repo, _dir) = repo().await;
        let incident = repo
            .create_incident(&request(IncidentCategory::PowerOutage, 5.0, 5.0))
            .await
            .unwrap();

        for text in ["First", "Second"] {
            repo.add_comment(
                &incident.id,
                &CreateCommentRequest {
                    text: text.to_string(),
                    author: None,
                },
            )
            .await
            .unwrap();
        }

        let comments = repo.list_comments(&incident.id).await.unwrap();
        let texts: Vec<&str> = comments.iter().map(|c| c.text.as_str()).collect();
        assert_eq!(texts, vec!["First", "Second"]);
        assert_eq!(comments[0].author, "Anonymous");

        let stored = repo.get_incident(&incident.id).await.unwrap().unwrap();
        assert_eq!(stored.comment_count, 2);

        repo.delete_incident(&incident.id).await.unwrap();
        assert!(repo.get_incident(&incident.id).await.unwrap().is_none());
        assert!(matches!(
            repo.list_comments(&incident.id).await.unwrap_err(),
            AppError::NotFound(_)
        ));
        assert!(matches!(
            repo.delete_incident(&incident.id).await.unwrap_err(),
            AppError::NotFound(_)
        ));
    }

    #[tokio::test]
    async fn test_stats() {
        let (repo, _dir) = repo().await;
        let a = repo
            .create_incident(&request(IncidentCategory::Flooding, 1.0, 1.0))
            .await
            .unwrap();
        repo.create_incident(&request(IncidentCategory::Flooding, 1.0, 1.0))
            .await
            .unwrap();
        repo.create_incident(&request(IncidentCategory::Fire, 1.0, 1.0))
            .await
            .unwrap();
        repo.upvote_incident(&a.id).await.unwrap();

        let stats = repo
            .incident_stats("1970-01-01T00:00:00.000Z")
            .await
            .unwrap();
        assert_eq!(stats.total, 3);
        assert_eq!(stats.total_upvotes, 1);
        assert_eq!(stats.by_category[&IncidentCategory::Flooding], 2);
        assert_eq!(stats.by_category[&IncidentCategory::Fire], 1);
        assert_eq!(stats.by_category[&IncidentCategory::PowerOutage], 0);
        assert_eq!(stats.by_severity[&Severity::High], 3);
        assert_eq!(stats.daily.iter().map(|d| d.count).sum::<i64>(), 3);
        assert_eq!(stats.top_category(), Some(IncidentCategory::Flooding));

        let future = repo
            .incident_stats("2999-01-01T00:00:00.000Z")
            .await
            .unwrap();
        assert_eq!(future.total, 0);
    }
}
