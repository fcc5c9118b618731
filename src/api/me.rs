// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use super::response::ApiResponse;
use crate::auth::{Auth, Principal};

/// `GET /api/v1/me`: the authenticated principal.
pub async fn me(Auth(principal): Auth) -> ApiResponse<Principal> {
    ApiResponse::ok("Principal retrieved successfully", principal)
}
