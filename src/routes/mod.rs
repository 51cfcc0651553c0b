/// Router Module Index
///
/// Routing is split by access level so each group's authentication is
/// applied once, at the module boundary.

/// Routes open to anonymous callers. Article reads resolve identity optionally.
pub mod public;

/// Routes behind the mandatory-auth middleware.
pub mod authenticated;

/// Routes whose handlers additionally require the ADMIN role.
pub mod admin;
