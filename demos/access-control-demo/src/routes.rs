use axum::response::Html;
use axum::routing::{get, post};
use axum::Router;
use gatehouse::prelude::*;
use serde::Serialize;

#[derive(Serialize)]
struct WhoAmI {
    sub: Option<String>,
    roles: Vec<String>,
    access_key: bool,
}

const ORDERS: [(u32, &str); 3] = [(1001, "Keyboard"), (1002, "Monitor"), (1003, "Desk lamp")];

async fn home() -> &'static str {
    "Welcome"
}

async fn login() -> Html<&'static str> {
    Html("<h1>Sign in</h1><form method=\"post\"><input name=\"user\"/></form>")
}

/// Lists orders; the action buttons depend on what the viewer may do.
async fn orders(Controls(gate): Controls) -> Html<String> {
    let actions = gate
        .visible(&["Orders.Edit", "Orders.Delete"])
        .await
        .unwrap_or_default();

    let mut html = String::from("<h1>Orders</h1><ul>");
    for (id, item) in ORDERS {
        html.push_str(&format!("<li>#{id} {item}"));
        for action in &actions {
            let label = action.trim_start_matches("Orders.");
            html.push_str(&format!(" <button data-order=\"{id}\">{label}</button>"));
        }
        html.push_str("</li>");
    }
    html.push_str("</ul>");
    Html(html)
}

async fn delete_order() -> &'static str {
    "Order deleted"
}

async fn dashboard() -> &'static str {
    "Admin dashboard"
}

async fn whoami(CurrentPrincipal(principal): CurrentPrincipal) -> axum::Json<WhoAmI> {
    axum::Json(WhoAmI {
        sub: principal.sub().map(str::to_string),
        roles: principal.roles().to_vec(),
        access_key: principal.access_key().is_some(),
    })
}

pub fn router(access: &AccessControl) -> Result<Router, AccessControlError> {
    Ok(Router::new()
        .route("/", get(home))
        .route("/Home/Index", get(home))
        .route("/Account/Login", get(login))
        .route("/Orders", get(orders))
        .route("/Orders/Delete", post(delete_order))
        .route(
            "/Admin/Dashboard",
            get(dashboard).route_layer(access.require("Admin.Dashboard")?),
        )
        .route("/whoami", get(whoami)))
}
