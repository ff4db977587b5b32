//! Shared fixture for service tests

use std::sync::Arc;

use cp_contracts::AssignCompaniesData;
use cp_core::traits::Id;
use cp_core::types::{EntityKind, Principal, Role};
use cp_db::MemoryStore;
use cp_models::{Company, Project, SubProject, Task};
use cp_notifications::{MemoryNotifier, Notifier};

use crate::Portal;

/// A project with two sub-projects
///
/// "Discovery" holds four tasks, "Delivery" holds one, and one legacy task
/// hangs directly off the project. `initech` owns the project.
pub(crate) struct World {
    pub store: Arc<MemoryStore>,
    pub notifier: Arc<MemoryNotifier>,
    pub portal: Portal,
    pub admin: Principal,
    pub consultant: Principal,
    pub acme_user: Principal,
    pub acme: Company,
    pub globex: Company,
    pub initech: Company,
    pub project: Project,
    pub sub_projects: Vec<SubProject>,
    pub tasks: Vec<Task>,
    pub handover: Task,
    pub legacy_task: Task,
}

impl World {
    pub async fn new() -> Self {
        let notifier = Arc::new(MemoryNotifier::new());
        Self::build(notifier.clone(), notifier).await
    }

    /// Same world, delivering through `notifier` instead of the recorder
    pub async fn with_notifier(notifier: Arc<dyn Notifier>) -> Self {
        Self::build(Arc::new(MemoryNotifier::new()), notifier).await
    }

    async fn build(recorder: Arc<MemoryNotifier>, notifier: Arc<dyn Notifier>) -> Self {
        let store = Arc::new(MemoryStore::new());
        let acme = store.insert_company("Acme", "ops@acme.test").await;
        let globex = store.insert_company("Globex", "pm@globex.test").await;
        let initech = store.insert_company("Initech", "it@initech.test").await;

        let project = store.insert_project("Platform rollout", Some(initech.id)).await;
        let discovery = store.insert_sub_project(project.id, "Discovery").await;
        let delivery = store.insert_sub_project(project.id, "Delivery").await;

        let mut tasks = Vec::new();
        for title in ["Interviews", "Inventory", "Gap analysis", "Report"] {
            tasks.push(store.insert_task(project.id, Some(discovery.id), title).await);
        }
        let handover = store.insert_task(project.id, Some(delivery.id), "Handover").await;
        let legacy_task = store.insert_task(project.id, None, "Kickoff").await;

        let project = store_project(&store, project.id).await;
        let portal = Portal::new(store.clone(), notifier);

        Self {
            store,
            notifier: recorder,
            portal,
            admin: Principal::new("admin@firm.test", Role::Admin),
            consultant: Principal::new("consultant@firm.test", Role::Consultant),
            acme_user: Principal::company("ops@acme.test", acme.id),
            acme,
            globex,
            initech,
            project,
            sub_projects: vec![discovery, delivery],
            tasks,
            handover,
            legacy_task,
        }
    }

    pub async fn assign(&self, kind: EntityKind, parent_id: Id, company_id: Id) {
        self.portal
            .assignments
            .assign(
                &self.consultant,
                AssignCompaniesData {
                    kind,
                    parent_id,
                    company_ids: vec![company_id],
                },
            )
            .await
            .unwrap();
    }
}

async fn store_project(store: &MemoryStore, id: Id) -> Project {
    use cp_db::HierarchyStore;
    store.find_project(id).await.unwrap().unwrap()
}
