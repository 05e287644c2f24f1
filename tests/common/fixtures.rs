use crmdesk::core::{
    auth::{AuthProvider, SignUpOutcome},
    db::{
        DataSource, NewCompany, NewContact, NewDeal, NewSalesProcess, NewStage, SalesProcess,
        SalesProcessRepository, Stage, StageRepository, StageType,
        local::{LocalStore, LocalWorkspace},
    },
};
use uuid::Uuid;

pub const TEST_PASSWORD: &str = "hunter22";

/// Creates a LocalStore in a temporary directory with email confirmation off.
/// Returns both the store and the temp directory (which must be kept alive).
pub async fn create_test_store() -> (LocalStore, tempfile::TempDir) {
    let dir = tempfile::TempDir::new().expect("Failed to create temp directory");
    let path = dir.path().join("test.db");
    let store = LocalStore::open(&path)
        .await
        .expect("Failed to open test store")
        .without_email_confirmation();
    (store, dir)
}

/// Registers `email` and returns the workspace of the new account.
pub async fn sign_up(store: &LocalStore, email: &str) -> LocalWorkspace {
    match store
        .sign_up(email, TEST_PASSWORD)
        .await
        .expect("Failed to register test user")
    {
        SignUpOutcome::SignedIn(session) => store.workspace(&session),
        SignUpOutcome::ConfirmationRequired { .. } => panic!("test store should not require confirmation"),
    }
}

/// Store plus two independent accounts.
pub async fn two_users() -> (LocalStore, tempfile::TempDir, LocalWorkspace, LocalWorkspace) {
    let (store, dir) = create_test_store().await;
    let alice = sign_up(&store, "alice@example.com").await;
    let bob = sign_up(&store, "bob@example.com").await;
    (store, dir, alice, bob)
}

/// The stages of a freshly seeded pipeline, in board order.
pub struct Pipeline {
    pub process: SalesProcess,
    pub lead: Stage,
    pub won: Stage,
    pub lost: Stage,
}

/// "Default Pipeline" with Lead (open), Won and Lost.
pub async fn seed_default_pipeline(ws: &LocalWorkspace) -> Pipeline {
    seed_pipeline(ws, "Default Pipeline", true).await
}

pub async fn seed_pipeline(ws: &LocalWorkspace, name: &str, is_default: bool) -> Pipeline {
    let process = ws
        .add_sales_process(&NewSalesProcess {
            name: name.to_string(),
            is_default,
        })
        .await
        .expect("Failed to create sales process");
    let lead = add_stage(ws, process.id, "Lead", 1, StageType::Open).await;
    let won = add_stage(ws, process.id, "Won", 2, StageType::Won).await;
    let lost = add_stage(ws, process.id, "Lost", 3, StageType::Lost).await;
    Pipeline {
        process,
        lead,
        won,
        lost,
    }
}

pub async fn add_stage(ws: &LocalWorkspace, process_id: Uuid, name: &str, order: i32, stage_type: StageType) -> Stage {
    ws.add_stage(&NewStage {
        process_id,
        name: name.to_string(),
        stage_order: order,
        stage_type,
    })
    .await
    .expect("Failed to create stage")
}

/// Creates a NewContact with test data
pub fn make_contact(first_name: &str, last_name: &str, company_id: Option<Uuid>) -> NewContact {
    NewContact {
        first_name: first_name.to_string(),
        last_name: last_name.to_string(),
        email: format!("{}@example.com", first_name.to_lowercase()),
        company_id,
    }
}

pub fn make_company(name: &str) -> NewCompany {
    NewCompany {
        name: name.to_string(),
        industry: None,
    }
}

pub fn make_deal(title: &str, process_id: Uuid, stage_id: Uuid) -> NewDeal {
    NewDeal {
        title: title.to_string(),
        value: None,
        contact_id: None,
        company_id: None,
        sales_process_id: process_id,
        current_stage_id: stage_id,
    }
}
