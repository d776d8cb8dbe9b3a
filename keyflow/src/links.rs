//! Cross-document navigation.
//!
//! Every check (syntax, permission, document, block) runs before the
//! session is touched, so a failed link leaves it exactly as it was.

use tracing::{debug, info, instrument};

use crate::core::collab::{Authorizer, Collaborators, Document, LoadError, Loader};
use crate::core::error::DispatchError;
use crate::core::link::{LinkExpr, Location};
use crate::core::session::{AuthContext, Session};

/// Whether `auth` may follow `expr`. Links without a predicate are public.
pub fn check(expr: &LinkExpr, authorizer: &dyn Authorizer, auth: &AuthContext) -> bool {
    expr.permission
        .as_deref()
        .is_none_or(|predicate| authorizer.check(predicate, auth))
}

/// Target location of `raw` from the session's current position.
///
/// Loads the target document but does not move the session.
pub fn target(
    raw: &str,
    session: &Session,
    collab: &Collaborators<'_>,
    default_block: &str,
) -> Result<Location, DispatchError> {
    let expr = LinkExpr::parse(raw)?;
    let path = expr.resolve_path(session.current_path().unwrap_or("/"));

    if !check(&expr, collab.auth, session.auth()) {
        return Err(DispatchError::PermissionDenied {
            target: path,
            predicate: expr.permission.unwrap_or_default(),
        });
    }

    let doc = load_document(collab.loader, &path)?;
    let block = match &expr.block {
        Some(block) if doc.has_block(block) => block.clone(),
        Some(block) => {
            return Err(DispatchError::BlockNotFound {
                path,
                block: block.clone(),
            });
        }
        None => doc
            .default_block(default_block)
            .map(str::to_string)
            .ok_or_else(|| DispatchError::BlockNotFound {
                path: path.clone(),
                block: default_block.to_string(),
            })?,
    };
    Ok(Location::new(path, block))
}

/// Follow `raw`: push a breadcrumb, record history and move the session.
#[instrument(skip_all, fields(link = raw))]
pub fn resolve(
    raw: &str,
    session: &mut Session,
    collab: &Collaborators<'_>,
    default_block: &str,
) -> Result<Location, DispatchError> {
    let location = target(raw, session, collab, default_block)?;
    session.relocate(location.clone(), &format!("link {raw}"));
    info!(to = %location, "followed link");
    Ok(location)
}

pub(crate) fn load_document(loader: &dyn Loader, path: &str) -> Result<Document, DispatchError> {
    debug!(path, "loading document");
    loader.load(path).map_err(|err| match err {
        LoadError::NotFound(path) => DispatchError::DocumentNotFound { path },
        LoadError::Invalid { path, message } => DispatchError::Load { path, message },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::link::LinkParseError;
    use crate::core::types::Mode;
    use crate::test_support::{Harness, doc};
    use serde_json::json;

    fn harness() -> Harness {
        Harness::new()
            .with_document(doc("/app/docs/current", json!({"Start": {"a": "x"}})))
            .with_document(doc(
                "/app/siblingDoc",
                json!({"Intro": {"k": "v"}, "Entry": {"k": "v"}}),
            ))
            .with_document(doc("/admin/panel", json!({"main": {"k": "v"}})))
    }

    fn session_at(location: &str) -> Session {
        let mut session = Session::new(Mode::Blocking);
        session.relocate(location.parse().expect("location"), "start");
        session
    }

    #[test]
    fn resolves_sibling_and_moves_session() {
        let harness = harness();
        let mut session = session_at("/app/docs/current.Start");
        let location = resolve("../siblingDoc.Entry", &mut session, &harness.collab(), "main")
            .expect("resolve");
        assert_eq!(location, Location::new("/app/siblingDoc", "Entry"));
        assert_eq!(session.current_path(), Some("/app/siblingDoc"));
        assert_eq!(session.current_block(), Some("Entry"));
        assert_eq!(session.breadcrumbs().trail(session.scope()).len(), 2);
        assert_eq!(
            session.history().last().expect("entry").context,
            "link ../siblingDoc.Entry"
        );
    }

    #[test]
    fn missing_block_falls_back_to_first_block() {
        let harness = harness();
        let session = session_at("/app/docs/current.Start");
        let location = target("../siblingDoc", &session, &harness.collab(), "main")
            .expect("target");
        assert_eq!(location.block, "Intro");
    }

    #[test]
    fn denied_permission_leaves_session_unchanged() {
        let harness = harness();
        let mut session = session_at("/app/docs/current.Start");
        let before = session.clone();
        let err = resolve("/admin/panel?admin", &mut session, &harness.collab(), "main")
            .unwrap_err();
        assert_eq!(
            err,
            DispatchError::PermissionDenied {
                target: "/admin/panel".to_string(),
                predicate: "admin".to_string(),
            }
        );
        assert_eq!(session, before);
        assert_eq!(harness.loader.loads(), 0);
    }

    #[test]
    fn granted_permission_follows() {
        let harness = harness().with_granted(["admin"]);
        let mut session = session_at("/app/docs/current.Start");
        let location =
            resolve("/admin/panel?admin", &mut session, &harness.collab(), "main").expect("resolve");
        assert_eq!(location, Location::new("/admin/panel", "main"));
    }

    #[test]
    fn not_found_errors_leave_session_unchanged() {
        let harness = harness();
        let mut session = session_at("/app/docs/current.Start");
        let before = session.clone();

        let err = resolve("./missing", &mut session, &harness.collab(), "main").unwrap_err();
        assert_eq!(
            err,
            DispatchError::DocumentNotFound {
                path: "/app/docs/missing".to_string()
            }
        );
        let err = resolve("../siblingDoc.Nope", &mut session, &harness.collab(), "main")
            .unwrap_err();
        assert!(matches!(err, DispatchError::BlockNotFound { block, .. } if block == "Nope"));
        let err = resolve("doc?", &mut session, &harness.collab(), "main").unwrap_err();
        assert_eq!(
            err,
            DispatchError::InvalidLink(LinkParseError::EmptyPredicate("doc?".to_string()))
        );
        assert_eq!(session, before);
    }
}
