//! System and user messages for event generation.

use chrono::{Local, NaiveDate};
use evgen_core::{ContextConfig, GenerationQuery, Profile, Tag, TaskConfig};
use serde_json::{json, Map, Value as JsonValue};

use crate::wire::ChatMessage;

const TASK_GOAL: &str =
    "Generate realistic local events this user would enjoy attending, within the given context.";

pub fn build_system_message() -> String {
    let tags = Tag::ALL
        .iter()
        .map(|tag| tag.display_name())
        .collect::<Vec<_>>()
        .join(", ");

    format!(
        "You generate event suggestions for a social events app.\n\
         \n\
         Output rules:\n\
         - Respond with JSON only.\n\
         - No markdown, no code fences, no prose before or after the JSON.\n\
         - The top-level value is an object with exactly one field, \"events\".\n\
         \n\
         Each element of \"events\" is an object with exactly these fields:\n\
         - \"title\": string, short and non-empty\n\
         - \"description\": string, one or two sentences, non-empty\n\
         - \"date\": string, local date-time formatted YYYY-MM-DDTHH:mm\n\
         - \"tags\": array of strings chosen from: {tags}\n\
         - \"location\": object with numeric \"latitude\" (-90..90) and \"longitude\" (-180..180)\n\
         \n\
         If no suitable event exists, return {{\"events\": []}}."
    )
}

pub fn build_user_message(profile: &Profile, task: &TaskConfig, context: &ContextConfig) -> String {
    build_user_message_at(profile, task, context, Local::now().date_naive())
}

/// Same as [`build_user_message`], with the date used for the age made explicit.
pub fn build_user_message_at(
    profile: &Profile,
    task: &TaskConfig,
    context: &ContextConfig,
    today: NaiveDate,
) -> String {
    let mut task_obj = Map::new();
    task_obj.insert("goal".into(), json!(TASK_GOAL));
    if let Some(count) = task.count {
        task_obj.insert("count".into(), json!(count));
    }
    task_obj.insert(
        "require_relevant_tags".into(),
        json!(task.require_relevant_tags),
    );

    let interests: Vec<&str> = profile.interests.iter().map(|t| t.display_name()).collect();
    let user = json!({
        "id": profile.id,
        "name": profile.full_name(),
        "age": profile.age_on(today),
        "country": profile.country,
        "description": profile.description,
        "interests": interests,
    });

    let mut ctx = Map::new();
    if let Some(name) = &context.location_name {
        ctx.insert("location".into(), json!(name));
    }
    if let Some(coords) = context.coordinates {
        ctx.insert(
            "coordinates".into(),
            json!({ "latitude": coords.latitude, "longitude": coords.longitude }),
        );
    }
    if let Some(radius) = context.radius_km {
        ctx.insert("radius_km".into(), json!(radius));
    }
    if let Some(frame) = &context.time_frame {
        ctx.insert("time_frame".into(), json!(frame));
    }

    let document = json!({
        "task": JsonValue::Object(task_obj),
        "user": user,
        "context": JsonValue::Object(ctx),
    });
    serde_json::to_string_pretty(&document).unwrap_or_else(|_| document.to_string())
}

pub fn build_messages(query: &GenerationQuery, today: NaiveDate) -> Vec<ChatMessage> {
    vec![
        ChatMessage::system(build_system_message()),
        ChatMessage::user(build_user_message_at(
            &query.profile,
            &query.task,
            &query.context,
            today,
        )),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wire::ChatRole;
    use evgen_core::Coordinates;
    use std::collections::BTreeSet;

    fn profile() -> Profile {
        Profile {
            id: "u-42".into(),
            first_name: "Marie".into(),
            last_name: "Curie".into(),
            country: "Switzerland".into(),
            description: "Into live music and hiking".into(),
            birth_date: NaiveDate::from_ymd_opt(1995, 5, 20).unwrap(),
            interests: BTreeSet::from([Tag::Rock, Tag::Hiking]),
        }
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, 21).unwrap()
    }

    fn parse(text: &str) -> JsonValue {
        serde_json::from_str(text).expect("user message is JSON")
    }

    #[test]
    fn system_message_is_stable_and_names_every_field() {
        let first = build_system_message();
        assert_eq!(first, build_system_message());
        for field in ["\"events\"", "\"title\"", "\"description\"", "\"date\"", "\"tags\"", "\"location\""] {
            assert!(first.contains(field), "missing {field}");
        }
        assert!(first.contains("JSON only"));
        assert!(first.contains("Rock, Pop, Jazz"));
    }

    #[test]
    fn user_message_carries_profile_task_and_default_context() {
        let text = build_user_message_at(
            &profile(),
            &TaskConfig::default(),
            &ContextConfig::default(),
            today(),
        );
        let doc = parse(&text);
        assert_eq!(doc["user"]["name"], "Marie Curie");
        assert_eq!(doc["user"]["age"], 29);
        assert_eq!(doc["user"]["interests"], json!(["Rock", "Hiking"]));
        assert_eq!(doc["task"]["require_relevant_tags"], true);
        assert!(doc["task"].get("count").is_none());
        assert_eq!(doc["context"], json!({"location": "Lausanne", "time_frame": "today"}));
    }

    #[test]
    fn user_message_emits_only_present_context_fields() {
        let context = ContextConfig {
            location_name: None,
            coordinates: Some(Coordinates::new(46.52, 6.63)),
            radius_km: Some(2.5),
            time_frame: None,
        };
        let task = TaskConfig {
            count: Some(3),
            require_relevant_tags: false,
        };
        let doc = parse(&build_user_message_at(&profile(), &task, &context, today()));
        assert_eq!(doc["task"]["count"], 3);
        assert_eq!(doc["task"]["require_relevant_tags"], false);
        assert_eq!(
            doc["context"],
            json!({"coordinates": {"latitude": 46.52, "longitude": 6.63}, "radius_km": 2.5})
        );
    }

    #[test]
    fn identical_inputs_give_identical_messages() {
        let query = GenerationQuery::new(profile());
        assert_eq!(build_messages(&query, today()), build_messages(&query, today()));
    }

    #[test]
    fn messages_are_system_then_user() {
        let messages = build_messages(&GenerationQuery::new(profile()), today());
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, ChatRole::System);
        assert_eq!(messages[1].role, ChatRole::User);
    }
}
