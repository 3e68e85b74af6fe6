use uuid::Uuid;

/// Normalizes an unordered user pair to (lo, hi) so every table storing a
/// relationship has exactly one row per pair regardless of argument order.
/// Callers must reject `a == b` before getting here.
pub fn canonicalize(a: Uuid, b: Uuid) -> (Uuid, Uuid) {
    if a < b { (a, b) } else { (b, a) }
}
