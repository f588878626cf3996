/// Joins the two participant ids of a conversation key.
pub const KEY_SEPARATOR: char = '_';

/// Conversation key for a pair of participants, independent of argument order.
pub fn conversation_key(a: &str, b: &str) -> String {
    let (low, high) = if a <= b { (a, b) } else { (b, a) };
    format!("{low}{KEY_SEPARATOR}{high}")
}
