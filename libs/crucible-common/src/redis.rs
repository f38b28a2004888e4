use crate::types::{Problem, ProblemSummary, SolveRecord};
use redis::{AsyncCommands, RedisResult};

/// Redis key semantics - defines only semantics, not runtime logic
/// Ensures API and CLI never drift and keys are deterministic

pub const PROBLEM_PREFIX: &str = "crucible:problem";
pub const PROBLEM_INDEX: &str = "crucible:problems";
pub const SOLVES_PREFIX: &str = "crucible:solves";

/// Keep at most this many solve records per problem
pub const SOLVE_LOG_CAP: isize = 10_000;

/// Generate problem key for a problem id
pub fn problem_key(problem_id: &str) -> String {
    format!("{}:{}", PROBLEM_PREFIX, problem_id)
}

/// Generate solve-log key for a problem id
pub fn solves_key(problem_id: &str) -> String {
    format!("{}:{}", SOLVES_PREFIX, problem_id)
}

fn serialization_error(e: serde_json::Error) -> redis::RedisError {
    redis::RedisError::from((redis::ErrorKind::TypeError, "serialization error", e.to_string()))
}

fn deserialization_error(e: serde_json::Error) -> redis::RedisError {
    redis::RedisError::from((redis::ErrorKind::TypeError, "deserialization error", e.to_string()))
}

/// Store a problem and register it in the index set
pub async fn put_problem(
    conn: &mut redis::aio::ConnectionManager,
    problem: &Problem,
) -> RedisResult<()> {
    let payload = serde_json::to_string(problem).map_err(serialization_error)?;

    let _: () = conn.set(problem_key(&problem.id), payload).await?;
    let _: () = conn.sadd(PROBLEM_INDEX, &problem.id).await?;
    Ok(())
}

/// Fetch a problem with its test cases
pub async fn get_problem(
    conn: &mut redis::aio::ConnectionManager,
    problem_id: &str,
) -> RedisResult<Option<Problem>> {
    let payload: Option<String> = conn.get(problem_key(problem_id)).await?;

    match payload {
        Some(data) => {
            let problem: Problem = serde_json::from_str(&data).map_err(deserialization_error)?;
            Ok(Some(problem))
        }
        None => Ok(None),
    }
}

/// List all indexed problems, sorted by id
/// Index entries whose problem key has vanished are skipped
pub async fn list_problems(
    conn: &mut redis::aio::ConnectionManager,
) -> RedisResult<Vec<ProblemSummary>> {
    let mut ids: Vec<String> = conn.smembers(PROBLEM_INDEX).await?;
    ids.sort();

    let mut summaries = Vec::with_capacity(ids.len());
    for id in ids {
        if let Some(problem) = get_problem(conn, &id).await? {
            summaries.push(ProblemSummary::from(&problem));
        }
    }
    Ok(summaries)
}

/// Append a verdict to the problem's solve log (newest first, capped)
pub async fn record_solve(
    conn: &mut redis::aio::ConnectionManager,
    record: &SolveRecord,
) -> RedisResult<()> {
    let key = solves_key(&record.problem_id);
    let payload = serde_json::to_string(record).map_err(serialization_error)?;

    let _: () = conn.lpush(&key, payload).await?;
    let _: () = conn.ltrim(&key, 0, SOLVE_LOG_CAP - 1).await?;
    Ok(())
}
