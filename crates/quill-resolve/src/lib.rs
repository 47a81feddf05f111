//! Name resolution over `quill-syntax` trees.
//!
//! Resolution is purely syntactic: locals are found lexically, members by
//! walking the class hierarchy by simple type name, and overloads by arity
//! and a best-effort static type of each argument. There is no classpath;
//! references to types outside the tree stay unresolved.

pub mod access;
pub mod members;
pub mod references;
pub mod scopes;

pub use access::{effective_visibility, is_accessible, package_of};
pub use members::{
    body_of, call_args, call_receiver, decl_type, enclosing_callable, enclosing_class,
    enclosing_member, find_class, overriding_methods, params_of, resolve_call, resolve_field_access,
    resolve_method_ref, static_type, super_methods, CallResolution,
};
pub use references::{find_references, references_in, Reference};
pub use scopes::{completes_normally, resolve_ident_at, resolve_name};
