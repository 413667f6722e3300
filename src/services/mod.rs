//! External collaborator interfaces: the post/comment store and the
//! notification service. This application only forwards data to them; it
//! owns neither schema nor delivery.

pub mod notify;
pub mod posts;
