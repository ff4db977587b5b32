//! API routes

use axum::{
    routing::{get, patch, post, put},
    Extension, Router,
};
use cp_core::types::EntityKind;

use crate::extractors::AppState;
use crate::handlers::{assignments, deletion, progress, schedule, tasks};

/// Create the complete API router
pub fn router() -> Router<AppState> {
    Router::new()
        .nest("/assignments", assignments_router())
        .nest("/companies", companies_router())
        .nest("/projects", hierarchy_router(EntityKind::Project))
        .nest("/sub-projects", hierarchy_router(EntityKind::SubProject))
        .nest("/tasks", tasks_router().merge(hierarchy_router(EntityKind::Task)))
}

fn assignments_router() -> Router<AppState> {
    Router::new()
        .route("/", post(assignments::assign_companies))
        .route("/:id", get(assignments::list_assignments))
        .route("/:id/dates", get(schedule::get_dates).post(schedule::distribute_dates))
}

fn companies_router() -> Router<AppState> {
    Router::new()
        .route("/:company_id/assignments", get(assignments::list_company_assignments))
        .route(
            "/:company_id/assignments/:assignment_id",
            patch(assignments::set_assignment_status),
        )
}

fn tasks_router() -> Router<AppState> {
    Router::new()
        .route("/:id/start", post(tasks::start_task))
        .route("/:id/complete", post(tasks::complete_task))
        .route("/:id/approve", post(tasks::approve_task))
        .route("/:id/reject", post(tasks::reject_task))
        .route("/:id/progress", get(tasks::task_progress))
        .route("/:id/history", get(tasks::task_history))
}

/// Delete and deletion-check for one level, plus rollups where the level
/// has them
fn hierarchy_router(kind: EntityKind) -> Router<AppState> {
    let mut router = Router::new()
        .route("/:id", axum::routing::delete(deletion::delete_entity))
        .route("/:id/deletion-check", get(deletion::deletion_check));
    if kind.has_rollup() {
        router = router
            .route("/:id/progress", get(progress::read_progress))
            .route("/:id/progress/:company_id", put(progress::override_progress));
    }
    router.layer(Extension(kind))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use axum::{
        body::{to_bytes, Body},
        http::{Request, StatusCode},
    };
    use cp_auth::{AuthConfig, Authenticator};
    use cp_core::traits::Id;
    use cp_db::MemoryStore;
    use cp_models::{Project, SubProject, Task};
    use cp_notifications::MemoryNotifier;
    use cp_services::Portal;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    struct Harness {
        app: Router,
        acme: Id,
        project: Project,
        sub_project: SubProject,
        tasks: Vec<Task>,
    }

    enum Caller {
        Anonymous,
        Admin,
        Consultant,
        Company(Id),
    }

    async fn harness() -> Harness {
        let store = Arc::new(MemoryStore::new());
        let acme = store.insert_company("Acme", "ops@acme.test").await;
        let project = store.insert_project("Platform rollout", None).await;
        let sub_project = store.insert_sub_project(project.id, "Discovery").await;
        let mut tasks = Vec::new();
        for title in ["Interviews", "Inventory"] {
            tasks.push(store.insert_task(project.id, Some(sub_project.id), title).await);
        }

        let portal = Portal::new(store, Arc::new(MemoryNotifier::new()));
        let state = AppState::new(portal, Authenticator::new(AuthConfig::gateway()));
        Harness {
            app: router().with_state(state),
            acme: acme.id,
            project,
            sub_project,
            tasks,
        }
    }

    impl Harness {
        async fn call(&self, method: &str, uri: &str, caller: Caller, body: Option<Value>) -> (StatusCode, Value) {
            let mut builder = Request::builder().method(method).uri(uri);
            builder = match caller {
                Caller::Anonymous => builder,
                Caller::Admin => builder
                    .header("x-user-email", "admin@firm.test")
                    .header("x-user-role", "admin"),
                Caller::Consultant => builder
                    .header("x-user-email", "consultant@firm.test")
                    .header("x-user-role", "consultant"),
                Caller::Company(id) => builder
                    .header("x-user-email", "ops@acme.test")
                    .header("x-user-role", "company")
                    .header("x-company-id", id.to_string()),
            };
            let request = match body {
                Some(body) => builder
                    .header("content-type", "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
                None => builder.body(Body::empty()).unwrap(),
            };

            let response = self.app.clone().oneshot(request).await.unwrap();
            let status = response.status();
            let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
            let value = if bytes.is_empty() {
                Value::Null
            } else {
                serde_json::from_slice(&bytes).unwrap()
            };
            (status, value)
        }

        async fn assign_sub_project(&self) {
            let body = json!({
                "kind": "sub_project",
                "parentEntityId": self.sub_project.id,
                "companyIds": [self.acme],
            });
            let (status, _) = self.call("POST", "/assignments", Caller::Consultant, Some(body)).await;
            assert_eq!(status, StatusCode::OK);
        }
    }

    #[tokio::test]
    async fn test_requires_identity() {
        let h = harness().await;
        let uri = format!("/projects/{}/progress", h.project.id);
        let (status, body) = h.call("GET", &uri, Caller::Anonymous, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"], "unauthorized");
    }

    #[tokio::test]
    async fn test_assign_twice_reports_already_assigned() {
        let h = harness().await;
        let body = json!({ "parentEntityId": h.project.id, "companyIds": [h.acme] });

        let (status, first) = h.call("POST", "/assignments", Caller::Consultant, Some(body.clone())).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(first["created"].as_array().unwrap().len(), 1);

        let (_, second) = h.call("POST", "/assignments", Caller::Consultant, Some(body)).await;
        assert!(second["created"].as_array().unwrap().is_empty());
        assert_eq!(second["alreadyAssigned"], json!([h.acme]));

        let uri = format!("/assignments/{}?kind=project", h.project.id);
        let (_, rows) = h.call("GET", &uri, Caller::Consultant, None).await;
        assert_eq!(rows.as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_company_cannot_assign() {
        let h = harness().await;
        let body = json!({ "parentEntityId": h.project.id, "companyIds": [h.acme] });
        let (status, body) = h.call("POST", "/assignments", Caller::Company(h.acme), Some(body)).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["error"], "forbidden");
    }

    #[tokio::test]
    async fn test_malformed_body() {
        let h = harness().await;
        let body = json!({ "companyIds": "all" });
        let (status, body) = h.call("POST", "/assignments", Caller::Consultant, Some(body)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "invalid_input");
    }

    #[tokio::test]
    async fn test_distribute_and_read_dates() {
        let h = harness().await;
        h.assign_sub_project().await;

        let uri = format!("/assignments/{}/dates", h.project.id);
        let body = json!({
            "companyId": h.acme,
            "mainProjectDates": { "startDate": "2024-01-01", "endDate": "2024-01-11" },
        });
        let (status, outcome) = h.call("POST", &uri, Caller::Company(h.acme), Some(body)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(outcome["subProjectsUpdated"], 1);
        assert_eq!(outcome["tasksUpdated"], 2);

        let uri = format!("/assignments/{}/dates?kind=task", h.tasks[1].id);
        let (status, record) = h.call("GET", &uri, Caller::Company(h.acme), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(record["startDate"], "2024-01-06");
        assert_eq!(record["endDate"], "2024-01-11");
    }

    #[tokio::test]
    async fn test_completion_flow() {
        let h = harness().await;
        h.assign_sub_project().await;
        let task = h.tasks[0].id;

        let (status, body) = h
            .call("POST", &format!("/tasks/{task}/start"), Caller::Company(h.acme), Some(json!({})))
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "in_progress");

        let (status, body) = h
            .call(
                "POST",
                &format!("/tasks/{task}/complete"),
                Caller::Company(h.acme),
                Some(json!({ "completionNote": "All interviews held", "actualHours": 4 })),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "submitted_for_approval");

        let (status, body) = h
            .call(
                "POST",
                &format!("/tasks/{task}/approve"),
                Caller::Consultant,
                Some(json!({ "qualityScore": 4 })),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "approved");

        let (status, body) = h
            .call(
                "POST",
                &format!("/tasks/{task}/reject"),
                Caller::Consultant,
                Some(json!({ "companyId": h.acme, "rejectionReason": "Too late" })),
            )
            .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["error"], "conflict");

        let uri = format!("/sub-projects/{}/progress?companyId={}", h.sub_project.id, h.acme);
        let (status, rollup) = h.call("GET", &uri, Caller::Company(h.acme), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(rollup["progressPercentage"], 50);
        assert_eq!(rollup["completedTasks"], 1);
        assert_eq!(rollup["totalTasks"], 2);

        let (_, history) = h
            .call("GET", &format!("/tasks/{task}/history"), Caller::Consultant, None)
            .await;
        assert_eq!(history.as_array().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_reject_reports_in_progress() {
        let h = harness().await;
        h.assign_sub_project().await;
        let task = h.tasks[1].id;
        h.call(
            "POST",
            &format!("/tasks/{task}/complete"),
            Caller::Company(h.acme),
            Some(json!({ "completionNote": "Spreadsheet attached" })),
        )
        .await;

        let (status, body) = h
            .call(
                "POST",
                &format!("/tasks/{task}/reject"),
                Caller::Admin,
                Some(json!({ "rejectionReason": "Inventory is incomplete" })),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "in_progress");
        assert_eq!(body["progress"]["status"], "rejected");
        assert_eq!(body["progress"]["progressPercentage"], 50);
    }

    #[tokio::test]
    async fn test_guarded_sub_project_delete() {
        let h = harness().await;
        h.assign_sub_project().await;
        let id = h.sub_project.id;

        let (status, report) = h
            .call("GET", &format!("/sub-projects/{id}/deletion-check"), Caller::Consultant, None)
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(report["allowed"], false);
        assert_eq!(report["reasons"][0]["kind"], "active_assignments");

        let (status, body) = h.call("DELETE", &format!("/sub-projects/{id}"), Caller::Admin, None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "dependency_blocked");
        assert_eq!(body["details"]["reasons"][0]["companyIds"], json!([h.acme]));

        let uri = format!("/companies/{}/assignments?kind=sub_project", h.acme);
        let (_, rows) = h.call("GET", &uri, Caller::Company(h.acme), None).await;
        let assignment_id = rows[0]["id"].as_i64().unwrap();

        let uri = format!("/companies/{}/assignments/{}", h.acme, assignment_id);
        let (status, updated) = h
            .call(
                "PATCH",
                &uri,
                Caller::Consultant,
                Some(json!({ "kind": "sub_project", "status": "inactive" })),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(updated["status"], "inactive");

        let (status, report) = h.call("DELETE", &format!("/sub-projects/{id}"), Caller::Admin, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(report["allowed"], true);
    }

    #[tokio::test]
    async fn test_manual_override() {
        let h = harness().await;
        h.assign_sub_project().await;

        let uri = format!("/projects/{}/progress/{}", h.project.id, h.acme);
        let (status, rollup) = h
            .call("PUT", &uri, Caller::Consultant, Some(json!({ "progressPercentage": 80 })))
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(rollup["manualOverride"], true);

        let (_, list) = h
            .call("GET", &format!("/projects/{}/progress", h.project.id), Caller::Consultant, None)
            .await;
        assert_eq!(list[0]["progressPercentage"], 80);

        let (status, _) = h
            .call("PUT", &uri, Caller::Consultant, Some(json!({ "progressPercentage": 120 })))
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_tasks_have_no_progress_route() {
        let h = harness().await;
        h.assign_sub_project().await;
        let uri = format!("/tasks/{}/progress", h.tasks[0].id);
        let (status, body) = h.call("GET", &uri, Caller::Company(h.acme), None).await;
        // Per-company task progress, not a rollup
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "pending");
    }
}
