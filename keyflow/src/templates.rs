//! Session-aware text templating for display commands.
//!
//! Display strings may reference `{{ user }}`, `{{ roles }}`, `{{ path }}`,
//! `{{ block }}` and `{{ scope }}`. Strings without template markers are
//! returned untouched.

use minijinja::{Environment, context};
use tracing::warn;

use crate::core::session::Session;

pub fn render_display(text: &str, session: &Session) -> String {
    if !text.contains("{{") && !text.contains("{%") {
        return text.to_string();
    }
    let env = Environment::new();
    let auth = session.auth();
    let rendered = env.render_str(
        text,
        context! {
            user => auth.user.as_deref(),
            roles => auth.roles.iter().collect::<Vec<_>>(),
            path => session.current_path(),
            block => session.current_block(),
            scope => session.scope(),
        },
    );
    match rendered {
        Ok(rendered) => rendered,
        Err(err) => {
            warn!(error = %err, "display template failed; showing raw text");
            text.to_string()
        }
    }
}
