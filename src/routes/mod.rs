/// Router Module Index
///
/// The user resource is declared as one route table in which every entry names its own
/// ordered guard chain. Methods on the same path (`/{id}`) carry different guards.

/// The `/api/users` route table.
pub mod users;
