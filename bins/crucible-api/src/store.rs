// Problem storage and solve-log collaborators

use async_trait::async_trait;
use crucible_common::redis;
use crucible_common::types::{Problem, ProblemSummary, SolveRecord};
use std::collections::{BTreeMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("redis error: {0}")]
    Redis(#[from] ::redis::RedisError),

    #[error("failed to read problems file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid problems file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("duplicate problem id `{0}`")]
    Duplicate(String),
}

/// Read access to problems and their test cases
#[async_trait]
pub trait ProblemStore: Send + Sync {
    async fn get(&self, id: &str) -> Result<Option<Problem>, StoreError>;

    async fn list(&self) -> Result<Vec<ProblemSummary>, StoreError>;
}

/// Sink for verdicts of problem-backed submissions
#[async_trait]
pub trait SolveLog: Send + Sync {
    async fn record(&self, record: &SolveRecord) -> Result<(), StoreError>;
}

/// Redis-backed problems and solve log
#[derive(Clone)]
pub struct RedisStore {
    conn: ::redis::aio::ConnectionManager,
}

impl RedisStore {
    pub fn new(conn: ::redis::aio::ConnectionManager) -> Self {
        Self { conn }
    }
}

#[async_trait]
impl ProblemStore for RedisStore {
    async fn get(&self, id: &str) -> Result<Option<Problem>, StoreError> {
        let mut conn = self.conn.clone();
        Ok(redis::get_problem(&mut conn, id).await?)
    }

    async fn list(&self) -> Result<Vec<ProblemSummary>, StoreError> {
        let mut conn = self.conn.clone();
        Ok(redis::list_problems(&mut conn).await?)
    }
}

#[async_trait]
impl SolveLog for RedisStore {
    async fn record(&self, record: &SolveRecord) -> Result<(), StoreError> {
        let mut conn = self.conn.clone();
        Ok(redis::record_solve(&mut conn, record).await?)
    }
}

/// In-process store: problems from a JSON file, solves kept in memory.
/// Each problem keeps its newest `solve_cap` solves, like the Redis list.
#[derive(Debug)]
pub struct MemoryStore {
    problems: BTreeMap<String, Problem>,
    solves: Mutex<BTreeMap<String, VecDeque<SolveRecord>>>,
    solve_cap: usize,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self {
            problems: BTreeMap::new(),
            solves: Mutex::default(),
            solve_cap: redis::SOLVE_LOG_CAP as usize,
        }
    }
}

impl MemoryStore {
    pub fn from_problems(problems: Vec<Problem>) -> Result<Self, StoreError> {
        let mut by_id = BTreeMap::new();
        for problem in problems {
            if by_id.contains_key(&problem.id) {
                return Err(StoreError::Duplicate(problem.id));
            }
            by_id.insert(problem.id.clone(), problem);
        }
        Ok(Self {
            problems: by_id,
            ..Self::default()
        })
    }

    pub fn with_solve_cap(mut self, solve_cap: usize) -> Self {
        self.solve_cap = solve_cap;
        self
    }

    /// Load a JSON array of problems
    pub fn load(path: &Path) -> Result<Self, StoreError> {
        let content = std::fs::read_to_string(path).map_err(|source| StoreError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let problems: Vec<Problem> =
            serde_json::from_str(&content).map_err(|source| StoreError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        Self::from_problems(problems)
    }

    pub fn len(&self) -> usize {
        self.problems.len()
    }

    /// Recorded solves grouped by problem id, oldest first within a problem
    pub fn solves(&self) -> Vec<SolveRecord> {
        let solves = self.solves.lock().unwrap_or_else(|e| e.into_inner());
        solves.values().flat_map(|log| log.iter().cloned()).collect()
    }
}

#[async_trait]
impl ProblemStore for MemoryStore {
    async fn get(&self, id: &str) -> Result<Option<Problem>, StoreError> {
        Ok(self.problems.get(id).cloned())
    }

    async fn list(&self) -> Result<Vec<ProblemSummary>, StoreError> {
        Ok(self.problems.values().map(ProblemSummary::from).collect())
    }
}

#[async_trait]
impl SolveLog for MemoryStore {
    async fn record(&self, record: &SolveRecord) -> Result<(), StoreError> {
        let mut solves = self.solves.lock().unwrap_or_else(|e| e.into_inner());
        let log = solves.entry(record.problem_id.clone()).or_default();
        log.push_back(record.clone());
        while log.len() > self.solve_cap {
            log.pop_front();
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use crucible_common::types::TestCase;
    use crucible_common::value::Value;
    use std::io::Write;
    use uuid::Uuid;

    fn problem(id: &str) -> Problem {
        Problem {
            id: id.to_string(),
            title: format!("Problem {}", id),
            description: String::new(),
            function_name: "solve".to_string(),
            test_cases: vec![TestCase {
                input: vec![Value::from(1i64)],
                expected: Value::from(1i64),
            }],
        }
    }

    #[tokio::test]
    async fn test_memory_store_get_and_list() {
        let store = MemoryStore::from_problems(vec![problem("2"), problem("1")]).unwrap();

        assert_eq!(store.get("1").await.unwrap(), Some(problem("1")));
        assert_eq!(store.get("3").await.unwrap(), None);

        let ids: Vec<String> = store.list().await.unwrap().into_iter().map(|p| p.id).collect();
        assert_eq!(ids, vec!["1", "2"]);
    }

    #[test]
    fn test_duplicate_ids_rejected() {
        let err = MemoryStore::from_problems(vec![problem("1"), problem("1")]).unwrap_err();
        assert!(matches!(err, StoreError::Duplicate(id) if id == "1"));
    }

    #[tokio::test]
    async fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        let body = serde_json::to_string(&vec![problem("7")]).unwrap();
        file.write_all(body.as_bytes()).unwrap();

        let store = MemoryStore::load(file.path()).unwrap();
        assert_eq!(store.len(), 1);
        assert_eq!(store.get("7").await.unwrap().unwrap().function_name, "solve");
    }

    #[test]
    fn test_load_invalid_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"{not json").unwrap();
        assert!(matches!(MemoryStore::load(file.path()), Err(StoreError::Parse { .. })));

        let missing = Path::new("/nonexistent/problems.json");
        assert!(matches!(MemoryStore::load(missing), Err(StoreError::Read { .. })));
    }

    #[test]
    fn test_bundled_problems_file_loads() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("../../config/problems.json");
        let store = MemoryStore::load(&path).unwrap();
        assert_eq!(store.len(), 3);
    }

    fn solve(problem_id: &str, passed_all: bool) -> SolveRecord {
        SolveRecord {
            submission_id: Uuid::new_v4(),
            problem_id: problem_id.to_string(),
            passed_all,
            recorded_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_solves_are_recorded_in_order() {
        let store = MemoryStore::default();
        for passed_all in [true, false] {
            store.record(&solve("1", passed_all)).await.unwrap();
        }

        let verdicts: Vec<bool> = store.solves().iter().map(|s| s.passed_all).collect();
        assert_eq!(verdicts, vec![true, false]);
    }

    #[tokio::test]
    async fn test_solve_log_drops_oldest_past_cap() {
        let store = MemoryStore::default().with_solve_cap(3);
        let records: Vec<SolveRecord> = (0..5).map(|_| solve("1", true)).collect();
        for record in &records {
            store.record(record).await.unwrap();
        }
        let other = solve("2", false);
        store.record(&other).await.unwrap();

        let kept: Vec<Uuid> = store.solves().iter().map(|s| s.submission_id).collect();
        let mut expected: Vec<Uuid> = records[2..].iter().map(|s| s.submission_id).collect();
        expected.push(other.submission_id);
        assert_eq!(kept, expected);
    }

    #[test]
    fn test_default_solve_cap_matches_redis() {
        assert_eq!(MemoryStore::default().solve_cap, redis::SOLVE_LOG_CAP as usize);
    }
}
