use serde_json::{Map, Value};

use adducation_core::model::{FIELD_SPELLINGS, UserId, UserProgress};

/// Body sent when pushing progress.
///
/// Backends disagree on field naming, so every field is written in both
/// camelCase and snake_case, plus the short `xp`/`level`/`streak` names.
#[must_use]
pub fn progress_sync_payload(user_id: &UserId, progress: &UserProgress) -> Value {
    let mut body = match serde_json::to_value(progress) {
        Ok(Value::Object(map)) => map,
        _ => Map::new(),
    };

    for (camel, snake) in FIELD_SPELLINGS {
        if camel != snake {
            if let Some(value) = body.get(camel).cloned() {
                body.insert(snake.to_string(), value);
            }
        }
    }

    let user = Value::String(user_id.as_str().to_string());
    body.insert("userId".into(), user.clone());
    body.insert("user_id".into(), user);
    body.insert("xp".into(), progress.total_xp.into());
    body.insert("level".into(), progress.current_level.into());
    body.insert("streak".into(), progress.current_streak.into());

    Value::Object(body)
}
