use crate::db::connection::DbPool;
use crate::db::models::{Choice, Poll, Tally};
use sqlx::Error;
use uuid::Uuid;

pub async fn create_poll(pool: &DbPool, question: &str) -> Result<Poll, Error> {
    let poll = sqlx::query_as::<_, Poll>(
        "INSERT INTO polls (id, question) VALUES ($1, $2) RETURNING id, question, yes, no, created_at",
    )
    .bind(Uuid::new_v4())
    .bind(question)
    .fetch_one(pool)
    .await?;

    Ok(poll)
}

pub async fn get_poll(pool: &DbPool, poll_id: Uuid) -> Result<Option<Poll>, Error> {
    let row = sqlx::query_as::<_, Poll>(
        "SELECT id, question, yes, no, created_at FROM polls WHERE id = $1",
    )
    .bind(poll_id)
    .fetch_optional(pool)
    .await?;

    Ok(row)
}

pub async fn get_all_polls(pool: &DbPool) -> Result<Vec<Poll>, Error> {
    let rows = sqlx::query_as::<_, Poll>(
        "SELECT id, question, yes, no, created_at FROM polls ORDER BY created_at DESC",
    )
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Single-statement increment; Postgres applies it atomically per row.
pub async fn increment_vote(
    pool: &DbPool,
    poll_id: Uuid,
    choice: Choice,
) -> Result<Option<Tally>, Error> {
    let sql = match choice {
        Choice::Yes => "UPDATE polls SET yes = yes + 1 WHERE id = $1 RETURNING yes, no",
        Choice::No => "UPDATE polls SET no = no + 1 WHERE id = $1 RETURNING yes, no",
    };

    let tally = sqlx::query_as::<_, Tally>(sql)
        .bind(poll_id)
        .fetch_optional(pool)
        .await?;

    Ok(tally)
}

pub async fn delete_poll(pool: &DbPool, poll_id: Uuid) -> Result<Option<Poll>, Error> {
    let row = sqlx::query_as::<_, Poll>(
        "DELETE FROM polls WHERE id = $1 RETURNING id, question, yes, no, created_at",
    )
    .bind(poll_id)
    .fetch_optional(pool)
    .await?;

    Ok(row)
}
