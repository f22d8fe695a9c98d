// xwatch: forward new posts from watched social-media accounts to chat channels.
//
// This is the library root. `watch` is the polling core; the other modules
// are the collaborators it talks to.

pub mod config;
pub mod db;
pub mod output;
pub mod sink;
pub mod status;
pub mod subscriptions;
pub mod timeline;
pub mod watch;
