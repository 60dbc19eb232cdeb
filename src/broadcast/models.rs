use crate::db::models::{Poll, Tally};
use serde::Serialize;
use uuid::Uuid;

/// Outbound `{id, yes, no}` message sent after every successful increment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TallyUpdate {
    pub id: Uuid,
    #[serde(flatten)]
    pub tally: Tally,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", content = "data")]
pub enum BroadcastEvent {
    #[serde(rename = "answer:output")]
    Tally(TallyUpdate),
    #[serde(rename = "poll:created")]
    PollCreated(Poll),
    #[serde(rename = "poll:deleted")]
    PollDeleted { id: Uuid },
}

impl BroadcastEvent {
    pub fn name(&self) -> &'static str {
        match self {
            BroadcastEvent::Tally(_) => "answer:output",
            BroadcastEvent::PollCreated(_) => "poll:created",
            BroadcastEvent::PollDeleted { .. } => "poll:deleted",
        }
    }

    pub fn poll_id(&self) -> Uuid {
        match self {
            BroadcastEvent::Tally(update) => update.id,
            BroadcastEvent::PollCreated(poll) => poll.id,
            BroadcastEvent::PollDeleted { id } => *id,
        }
    }

    /// Payload without the envelope, as sent in an SSE `data:` field.
    pub fn data_json(&self) -> Result<String, serde_json::Error> {
        match self {
            BroadcastEvent::Tally(update) => serde_json::to_string(update),
            BroadcastEvent::PollCreated(poll) => serde_json::to_string(poll),
            BroadcastEvent::PollDeleted { id } => serde_json::to_string(&serde_json::json!({ "id": id })),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_tally_update_wire_shape() {
        let id = Uuid::new_v4();
        let event = BroadcastEvent::Tally(TallyUpdate {
            id,
            tally: Tally::new(3, 2),
        });

        assert_eq!(
            serde_json::to_value(&event).unwrap(),
            json!({"event": "answer:output", "data": {"id": id, "yes": 3, "no": 2}})
        );
        assert_eq!(
            serde_json::from_str::<serde_json::Value>(&event.data_json().unwrap()).unwrap(),
            json!({"id": id, "yes": 3, "no": 2})
        );
    }

    #[test]
    fn test_deleted_notice_shape() {
        let id = Uuid::new_v4();
        let event = BroadcastEvent::PollDeleted { id };
        assert_eq!(event.name(), "poll:deleted");
        assert_eq!(event.poll_id(), id);
        assert_eq!(
            serde_json::to_value(&event).unwrap(),
            json!({"event": "poll:deleted", "data": {"id": id}})
        );
    }

    #[test]
    fn test_created_notice_data_is_the_poll() {
        let poll = Poll::new("Pineapple on pizza?");
        let event = BroadcastEvent::PollCreated(poll.clone());

        let data: serde_json::Value = serde_json::from_str(&event.data_json().unwrap()).unwrap();
        assert_eq!(data["id"], json!(poll.id));
        assert_eq!(data["question"], "Pineapple on pizza?");
        assert_eq!(data["yes"], 0);
    }
}
