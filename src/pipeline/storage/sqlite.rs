use super::traits::*;
use super::{StoreError, StoreResult};
use crate::domain::*;
use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::{debug, info};

const SCHEMA: &str = r#"
    CREATE TABLE IF NOT EXISTS graph_nodes (
        kind        TEXT NOT NULL,
        node_key    TEXT NOT NULL,
        properties  TEXT NOT NULL,
        PRIMARY KEY (kind, node_key)
    );
    CREATE TABLE IF NOT EXISTS graph_edges (
        kind        TEXT NOT NULL,
        source_key  TEXT NOT NULL,
        target_key  TEXT NOT NULL,
        role        TEXT NOT NULL DEFAULT '',
        UNIQUE (kind, source_key, target_key, role)
    );
    CREATE INDEX IF NOT EXISTS idx_graph_edges_target ON graph_edges (kind, target_key);
"#;

/// Persistent graph store on a local SQLite file.
///
/// Nodes live in one table keyed by (kind, canonical key) with their
/// attributes as a JSON document; edges in another with a uniqueness
/// constraint over the full identity tuple. Each batch is one transaction.
pub struct SqliteGraphStore {
    conn: Arc<Mutex<Connection>>,
    location: Option<PathBuf>,
}

impl SqliteGraphStore {
    pub fn open<P: AsRef<Path>>(path: P) -> StoreResult<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        info!("Opened SQLite graph store at {}", path.display());
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            location: Some(path.to_path_buf()),
        })
    }

    pub fn open_in_memory() -> StoreResult<Self> {
        let conn = Connection::open_in_memory()?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            location: None,
        })
    }

    pub fn location(&self) -> Option<&Path> {
        self.location.as_deref()
    }

    /// Runs `f` against the connection on the blocking pool.
    async fn with_conn<F, T>(&self, f: F) -> StoreResult<T>
    where
        F: FnOnce(&mut Connection) -> StoreResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let mut guard = conn.lock().unwrap();
            f(&mut guard)
        })
        .await
        .map_err(|e| StoreError::Task(e.to_string()))?
    }
}

fn node_exists(conn: &Connection, key: &NodeKey) -> rusqlite::Result<bool> {
    conn.query_row(
        "SELECT 1 FROM graph_nodes WHERE kind = ?1 AND node_key = ?2",
        params![key.kind().label(), key.canonical_id()],
        |_| Ok(()),
    )
    .optional()
    .map(|found| found.is_some())
}

fn decode_edge(kind: &str, source: &str, target: &str, role: &str) -> StoreResult<EdgeRecord> {
    let corrupt = || StoreError::Write(format!("unreadable edge row {kind} {source} -> {target}"));
    let kind = EdgeKind::from_label(kind).ok_or_else(corrupt)?;
    let (source_kind, target_kind) = kind.endpoints();
    Ok(EdgeRecord {
        kind,
        source: NodeKey::from_canonical(source_kind, source).ok_or_else(corrupt)?,
        target: NodeKey::from_canonical(target_kind, target).ok_or_else(corrupt)?,
        role: if role.is_empty() {
            None
        } else {
            Some(PhysicianRole::from_tag(role).ok_or_else(corrupt)?)
        },
    })
}

#[async_trait]
impl GraphStore for SqliteGraphStore {
    async fn health_check(&self) -> StoreResult<()> {
        self.with_conn(|conn| {
            conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0))
                .map_err(|e| StoreError::Unavailable(e.to_string()))?;
            Ok(())
        })
        .await
    }

    async fn ensure_schema(&self) -> StoreResult<()> {
        self.with_conn(|conn| {
            conn.execute_batch(SCHEMA)?;
            debug!("SQLite graph schema ensured");
            Ok(())
        })
        .await
    }

    async fn upsert_nodes(
        &self,
        kind: NodeKind,
        batch: &[NodeRecord],
    ) -> StoreResult<NodeBatchOutcome> {
        let rows = batch
            .iter()
            .map(|record| {
                let props = serde_json::to_string(&record.properties()?)?;
                Ok((record.key().canonical_id(), props))
            })
            .collect::<StoreResult<Vec<(String, String)>>>()?;

        self.with_conn(move |conn| {
            let tx = conn.transaction()?;
            let mut outcome = NodeBatchOutcome::default();
            {
                let mut stmt = tx.prepare(
                    "INSERT OR IGNORE INTO graph_nodes (kind, node_key, properties) VALUES (?1, ?2, ?3)",
                )?;
                for (key, props) in &rows {
                    if stmt.execute(params![kind.label(), key, props])? == 1 {
                        outcome.inserted += 1;
                    } else {
                        outcome.already_present += 1;
                    }
                }
            }
            tx.commit()?;
            debug!(
                "Upserted {} {} nodes ({} already present)",
                outcome.inserted, kind, outcome.already_present
            );
            Ok(outcome)
        })
        .await
    }

    async fn upsert_edges(
        &self,
        kind: EdgeKind,
        batch: &[EdgeRecord],
    ) -> StoreResult<EdgeBatchOutcome> {
        let batch = batch.to_vec();
        self.with_conn(move |conn| {
            let tx = conn.transaction()?;
            let mut outcome = EdgeBatchOutcome::default();
            {
                let mut stmt = tx.prepare(
                    "INSERT OR IGNORE INTO graph_edges (kind, source_key, target_key, role) VALUES (?1, ?2, ?3, ?4)",
                )?;
                for edge in batch {
                    let mut missing = Vec::new();
                    for key in [&edge.source, &edge.target] {
                        if !node_exists(&tx, key)? {
                            missing.push(key.clone());
                        }
                    }
                    if !missing.is_empty() {
                        outcome.rejected.push((edge, missing));
                        continue;
                    }

                    let written = stmt.execute(params![
                        kind.label(),
                        edge.source.canonical_id(),
                        edge.target.canonical_id(),
                        edge.role_tag()
                    ])?;
                    if written == 1 {
                        outcome.inserted += 1;
                    } else {
                        outcome.already_present += 1;
                    }
                }
            }
            tx.commit()?;
            debug!(
                "Upserted {} {} edges ({} already present, {} rejected)",
                outcome.inserted,
                kind,
                outcome.already_present,
                outcome.rejected.len()
            );
            Ok(outcome)
        })
        .await
    }

    async fn count_nodes(&self, kind: NodeKind) -> StoreResult<u64> {
        self.with_conn(move |conn| {
            let n: i64 = conn.query_row(
                "SELECT COUNT(*) FROM graph_nodes WHERE kind = ?1",
                params![kind.label()],
                |row| row.get(0),
            )?;
            Ok(n as u64)
        })
        .await
    }

    async fn count_edges(&self, kind: EdgeKind) -> StoreResult<u64> {
        self.with_conn(move |conn| {
            let n: i64 = conn.query_row(
                "SELECT COUNT(*) FROM graph_edges WHERE kind = ?1",
                params![kind.label()],
                |row| row.get(0),
            )?;
            Ok(n as u64)
        })
        .await
    }

    async fn claim_attachments(&self) -> StoreResult<Vec<ClaimAttachment>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                r#"
                SELECT n.node_key,
                       (SELECT COUNT(*) FROM graph_edges e
                         WHERE e.kind = 'FILED' AND e.target_key = n.node_key),
                       (SELECT COUNT(*) FROM graph_edges e
                         WHERE e.kind = 'HAS_CLAIM' AND e.target_key = n.node_key)
                FROM graph_nodes n
                WHERE n.kind = 'Claim'
                ORDER BY n.node_key
                "#,
            )?;
            let attachments = stmt
                .query_map([], |row| {
                    Ok(ClaimAttachment {
                        claim_id: row.get(0)?,
                        filed: row.get::<_, i64>(1)? as u64,
                        has_claim: row.get::<_, i64>(2)? as u64,
                    })
                })?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(attachments)
        })
        .await
    }

    async fn duplicate_edge_tuples(&self) -> StoreResult<Vec<DuplicateEdge>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                r#"
                SELECT kind, source_key, target_key, role, COUNT(*)
                FROM graph_edges
                GROUP BY kind, source_key, target_key, role
                HAVING COUNT(*) > 1
                "#,
            )?;
            let rows = stmt
                .query_map([], |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, String>(3)?,
                        row.get::<_, i64>(4)?,
                    ))
                })?
                .collect::<rusqlite::Result<Vec<_>>>()?;

            rows.into_iter()
                .map(|(kind, source, target, role, n)| {
                    Ok(DuplicateEdge {
                        edge: decode_edge(&kind, &source, &target, &role)?,
                        occurrences: n as u64,
                    })
                })
                .collect()
        })
        .await
    }

    async fn claim_costs(&self) -> StoreResult<Vec<StoredClaimCost>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                r#"
                SELECT c.node_key, c.properties, p.properties
                FROM graph_nodes c
                LEFT JOIN graph_edges f
                       ON f.kind = 'FILED' AND f.target_key = c.node_key
                LEFT JOIN graph_nodes p
                       ON p.kind = 'Provider' AND p.node_key = f.source_key
                WHERE c.kind = 'Claim'
                ORDER BY c.node_key
                "#,
            )?;
            let rows = stmt
                .query_map([], |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, Option<String>>(2)?,
                    ))
                })?
                .collect::<rusqlite::Result<Vec<_>>>()?;

            let mut seen = HashSet::new();
            let mut costs = Vec::with_capacity(rows.len());
            for (claim_id, claim_props, provider_props) in rows {
                // A claim filed twice joins twice; the first filer is reported
                if !seen.insert(claim_id.clone()) {
                    continue;
                }
                let claim: ClaimNode = serde_json::from_str(&claim_props)?;
                let provider_fraud = match provider_props {
                    Some(props) => Some(serde_json::from_str::<ProviderNode>(&props)?.fraud_flag),
                    None => None,
                };
                costs.push(StoredClaimCost {
                    claim_id,
                    total_cost: claim.total_cost,
                    reimbursed_amount: claim.reimbursed_amount,
                    deductible_amount: claim.deductible_amount,
                    provider_fraud,
                });
            }
            Ok(costs)
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn claim(id: &str, reimbursed: f64, deductible: f64) -> NodeRecord {
        NodeRecord::Claim(ClaimNode {
            claim_id: id.to_string(),
            claim_kind: ClaimKind::Outpatient,
            total_cost: reimbursed + deductible,
            reimbursed_amount: reimbursed,
            deductible_amount: deductible,
            start_date: None,
            end_date: None,
            claim_duration_days: None,
            admission_date: None,
            discharge_date: None,
            diagnosis_group_code: None,
        })
    }

    async fn seeded_store() -> SqliteGraphStore {
        let store = SqliteGraphStore::open_in_memory().unwrap();
        store.ensure_schema().await.unwrap();
        store
            .upsert_nodes(
                NodeKind::Provider,
                &[NodeRecord::Provider(ProviderNode {
                    provider_id: "PRV1".into(),
                    fraud_flag: true,
                })],
            )
            .await
            .unwrap();
        store
            .upsert_nodes(NodeKind::Claim, &[claim("CLM1", 100.0, 10.0)])
            .await
            .unwrap();
        store
    }

    #[tokio::test]
    async fn test_schema_is_reentrant() {
        let store = SqliteGraphStore::open_in_memory().unwrap();
        store.health_check().await.unwrap();
        store.ensure_schema().await.unwrap();
        store.ensure_schema().await.unwrap();
        assert_eq!(store.count_nodes(NodeKind::Claim).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_node_upsert_leaves_existing_rows() {
        let store = seeded_store().await;
        let outcome = store
            .upsert_nodes(NodeKind::Claim, &[claim("CLM1", 999.0, 0.0)])
            .await
            .unwrap();

        assert_eq!(outcome.already_present, 1);
        let costs = store.claim_costs().await.unwrap();
        assert_eq!(costs[0].total_cost, 110.0);
    }

    #[tokio::test]
    async fn test_edges_are_unique_and_checked_against_nodes() {
        let store = seeded_store().await;
        let batch = vec![
            EdgeRecord::filed("PRV1", "CLM1"),
            EdgeRecord::filed("PRV1", "CLM1"),
            EdgeRecord::filed("PRV9", "CLM1"),
        ];

        let outcome = store.upsert_edges(EdgeKind::Filed, &batch).await.unwrap();
        assert_eq!(outcome.inserted, 1);
        assert_eq!(outcome.already_present, 1);
        assert_eq!(outcome.rejected.len(), 1);
        assert_eq!(store.count_edges(EdgeKind::Filed).await.unwrap(), 1);
        assert!(store.duplicate_edge_tuples().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_claim_attachments_and_costs() {
        let store = seeded_store().await;
        store
            .upsert_edges(EdgeKind::Filed, &[EdgeRecord::filed("PRV1", "CLM1")])
            .await
            .unwrap();

        let attachments = store.claim_attachments().await.unwrap();
        assert_eq!(
            attachments,
            vec![ClaimAttachment {
                claim_id: "CLM1".into(),
                filed: 1,
                has_claim: 0,
            }]
        );

        let costs = store.claim_costs().await.unwrap();
        assert_eq!(costs[0].provider_fraud, Some(true));
    }

    #[tokio::test]
    async fn test_medical_code_keys_persist_across_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("graph").join("claims.db");

        {
            let store = SqliteGraphStore::open(&path).unwrap();
            store.ensure_schema().await.unwrap();
            let codes = vec![
                NodeRecord::MedicalCode(MedicalCodeNode {
                    code: "4019".into(),
                    code_kind: CodeKind::Diagnosis,
                }),
                NodeRecord::MedicalCode(MedicalCodeNode {
                    code: "4019".into(),
                    code_kind: CodeKind::Procedure,
                }),
            ];
            let outcome = store.upsert_nodes(NodeKind::MedicalCode, &codes).await.unwrap();
            assert_eq!(outcome.inserted, 2);
        }

        let reopened = SqliteGraphStore::open(&path).unwrap();
        reopened.ensure_schema().await.unwrap();
        assert_eq!(reopened.count_nodes(NodeKind::MedicalCode).await.unwrap(), 2);
        assert_eq!(reopened.location(), Some(path.as_path()));
    }
}
