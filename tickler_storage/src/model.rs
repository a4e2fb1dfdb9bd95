use tickler_models::reminder::ReminderRule;

/// Creation request. The store assigns the id and stores the reminder enabled,
/// with no occurrence computed yet.
#[derive(Debug, Clone)]
pub struct NewReminder {
    pub title: String,
    pub description: Option<String>,
    pub rule: ReminderRule,
}
