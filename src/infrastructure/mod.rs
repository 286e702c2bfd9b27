/// Provider-backed implementations of the collaborator traits in
/// [`crate::stores`].
pub mod aws;
