// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Static security response headers.
//!
//! The header set is computed once from configuration and shared read-only
//! by every request.

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::{
        header::{
            CONTENT_SECURITY_POLICY, REFERRER_POLICY, SERVER, STRICT_TRANSPORT_SECURITY,
            X_CONTENT_TYPE_OPTIONS, X_DNS_PREFETCH_CONTROL, X_FRAME_OPTIONS, X_XSS_PROTECTION,
        },
        HeaderMap, HeaderName, HeaderValue,
    },
    middleware::Next,
    response::Response,
};

use crate::config::AppConfig;

const FONT_ORIGINS: [&str; 2] = ["https://fonts.googleapis.com", "https://fonts.gstatic.com"];

const HSTS: &str = "max-age=31536000; includeSubDomains; preload";

/// Precomputed security headers for one deployment mode.
#[derive(Debug, Clone)]
pub struct SecurityHeaders {
    headers: Vec<(HeaderName, HeaderValue)>,
}

impl SecurityHeaders {
    pub fn from_config(config: &AppConfig) -> Self {
        let production = config.is_production();
        let csp = content_security_policy(&config.cors.allowed_origins, production);

        let mut headers = vec![(CONTENT_SECURITY_POLICY, csp)];
        if production {
            headers.push((
                HeaderName::from_static("cross-origin-embedder-policy"),
                HeaderValue::from_static("require-corp"),
            ));
        }

        let fixed = [
            (HeaderName::from_static("cross-origin-opener-policy"), "same-origin"),
            (HeaderName::from_static("cross-origin-resource-policy"), "same-origin"),
            (HeaderName::from_static("origin-agent-cluster"), "?1"),
            (REFERRER_POLICY, "strict-origin-when-cross-origin"),
            (STRICT_TRANSPORT_SECURITY, HSTS),
            (X_CONTENT_TYPE_OPTIONS, "nosniff"),
            (X_DNS_PREFETCH_CONTROL, "off"),
            (HeaderName::from_static("x-download-options"), "noopen"),
            (X_FRAME_OPTIONS, "DENY"),
            (HeaderName::from_static("x-permitted-cross-domain-policies"), "none"),
            (X_XSS_PROTECTION, "0"),
        ];
        headers.extend(
            fixed
                .into_iter()
                .map(|(name, value)| (name, HeaderValue::from_static(value))),
        );

        Self { headers }
    }

    pub fn get(&self, name: &HeaderName) -> Option<&HeaderValue> {
        self.headers.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    /// Write the header set and strip server disclosure headers.
    pub fn apply(&self, headers: &mut HeaderMap) {
        for (name, value) in &self.headers {
            headers.insert(name.clone(), value.clone());
        }
        headers.remove(HeaderName::from_static("x-powered-by"));
        headers.remove(SERVER);
    }
}

/// Build the `Content-Security-Policy` value.
///
/// Script, style, connect and image sources are limited to self plus the
/// configured frontend origins. Non-production modes additionally allow
/// inline and eval scripts for local tooling.
pub fn content_security_policy(frontends: &[String], production: bool) -> HeaderValue {
    let with_frontends = |base: &[&str]| -> String {
        base.iter()
            .map(|s| s.to_string())
            .chain(frontends.iter().cloned())
            .collect::<Vec<_>>()
            .join(" ")
    };

    let script = if production {
        with_frontends(&["'self'"])
    } else {
        with_frontends(&["'self'", "'unsafe-inline'", "'unsafe-eval'"])
    };
    let style = with_frontends(&["'self'", "'unsafe-inline'", FONT_ORIGINS[0], FONT_ORIGINS[1]]);
    let img = format!("{} data: blob:", with_frontends(&["'self'"]));

    let mut directives = vec![
        "default-src 'self'".to_string(),
        "base-uri 'self'".to_string(),
        format!("script-src {script}"),
        "script-src-attr 'none'".to_string(),
        format!("style-src {style}"),
        format!("font-src 'self' {} data:", FONT_ORIGINS[1]),
        format!("connect-src {}", with_frontends(&["'self'"])),
        format!("img-src {img}"),
        "object-src 'none'".to_string(),
        "media-src 'self'".to_string(),
        "frame-src 'self'".to_string(),
        "frame-ancestors 'self'".to_string(),
        "worker-src 'self' blob:".to_string(),
        "child-src 'self' blob:".to_string(),
        "form-action 'self'".to_string(),
    ];
    if production {
        directives.push("upgrade-insecure-requests".to_string());
    }

    // Origins were validated as URLs at startup, so the value is visible ASCII.
    HeaderValue::from_str(&directives.join("; "))
        .unwrap_or_else(|_| HeaderValue::from_static("default-src 'self'"))
}

/// Axum middleware applying [`SecurityHeaders`] to every response.
pub async fn security_headers(
    State(headers): State<Arc<SecurityHeaders>>,
    request: Request,
    next: Next,
) -> Response {
    let mut response = next.run(request).await;
    headers.apply(response.headers_mut());
    response
}
