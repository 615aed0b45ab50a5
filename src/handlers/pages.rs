use serde_json::json;
use tracing::debug;

use crate::dispatcher::{HandlerOutput, HandlerRequest, ResourceHandler};
use crate::router::RouteId;
use crate::static_files::StaticFiles;

/// Site pages rendered from templates: `index.html` for `/`, `about.html` for `/about`.
///
/// Templates see `domain`, `origin` and, for a signed-in browser, `nickname`.
pub struct SitePages {
    templates: StaticFiles,
    domain: String,
}

impl SitePages {
    pub fn new(templates: StaticFiles, domain: impl Into<String>) -> Self {
        Self {
            templates,
            domain: domain.into(),
        }
    }

    pub const ROUTES: &'static [RouteId] = &[RouteId::Root, RouteId::About];

    fn template(route: RouteId) -> Option<&'static str> {
        match route {
            RouteId::Root => Some("index.html"),
            RouteId::About => Some("about.html"),
            _ => None,
        }
    }
}

impl ResourceHandler for SitePages {
    fn handle(&self, req: &HandlerRequest) -> Option<HandlerOutput> {
        let name = Self::template(req.route)?;
        let nickname = req.auth.authorized_nickname();
        let ctx = json!({
            "domain": self.domain,
            "origin": req.origin,
            "nickname": (!nickname.is_empty()).then_some(nickname),
        });
        match self.templates.render(name, &ctx) {
            Ok(html) => Some(HandlerOutput::new(html)),
            Err(e) => {
                debug!(request_id = %req.request_id, template = name, error = %e, "S1: page not rendered");
                None
            }
        }
    }
}
