//! Shared marketplace world for behaviour suites.
//!
//! Every scenario runs against the in-memory gateway with a frozen clock and
//! four seeded accounts sharing one password.

use std::future::Future;
use std::sync::Arc;

use kaakazini_core::CoreServices;
use kaakazini_core::domain::{
    DisplayName, Email, Error, Identity, JobId, LoginCredentials, Payment, PaymentId, Role,
};
use kaakazini_core::outbound::credentials::MemoryCredentialStore;
use kaakazini_core::outbound::memory::InMemoryGateway;
use kaakazini_core::test_support::MutableClock;
use rstest_bdd::Slot;
use rstest_bdd_macros::ScenarioState;
use tokio::runtime::Runtime;

pub const PASSWORD: &str = "correct horse";

/// Wrapper for non-Clone types to enable storage in `Slot`.
#[derive(Clone)]
pub struct RuntimeHandle(Arc<Runtime>);

/// Seeded accounts, by the part they play.
#[derive(Clone)]
pub struct Accounts {
    pub client: Identity,
    pub first_craftsman: Identity,
    pub second_craftsman: Identity,
    pub admin: Identity,
}

#[derive(Default, ScenarioState)]
pub struct MarketplaceWorld {
    runtime: Slot<RuntimeHandle>,
    services: Slot<CoreServices<InMemoryGateway>>,
    clock: Slot<Arc<MutableClock>>,
    accounts: Slot<Accounts>,
    pub job: Slot<JobId>,
    pub payment: Slot<Payment>,
    pub last_error: Slot<Error>,
}

fn seed(gateway: &InMemoryGateway, role: Role, name: &str, email: &str) -> Identity {
    gateway
        .seed_account(
            role,
            DisplayName::new(name).expect("fixture name"),
            Email::new(email).expect("fixture email"),
            PASSWORD,
        )
        .expect("seed account")
}

impl MarketplaceWorld {
    pub fn open_marketplace(&self) {
        let runtime = Runtime::new().expect("create runtime");
        let clock = Arc::new(MutableClock::default());
        let gateway = Arc::new(InMemoryGateway::new(clock.clone()));
        let accounts = Accounts {
            client: seed(&gateway, Role::Client, "Amina", "amina@example.com"),
            first_craftsman: seed(&gateway, Role::Craftsman, "Juma", "juma@example.com"),
            second_craftsman: seed(&gateway, Role::Craftsman, "Baraka", "baraka@example.com"),
            admin: seed(&gateway, Role::Admin, "Wanjiru", "wanjiru@example.com"),
        };
        let services =
            CoreServices::new(gateway, Arc::new(MemoryCredentialStore::new()), clock.clone());

        self.runtime.set(RuntimeHandle(Arc::new(runtime)));
        self.services.set(services);
        self.clock.set(clock);
        self.accounts.set(accounts);
    }

    pub fn accounts(&self) -> Accounts {
        self.accounts.get().expect("marketplace opened")
    }

    pub fn clock(&self) -> Arc<MutableClock> {
        self.clock.get().expect("marketplace opened")
    }

    pub fn job_id(&self) -> JobId {
        self.job.get().expect("a job was submitted")
    }

    pub fn payment_id(&self) -> PaymentId {
        self.payment.get().expect("a payment was recorded").id()
    }

    /// Run `operation` to completion on the scenario runtime.
    pub fn run<T, F>(&self, operation: impl FnOnce(CoreServices<InMemoryGateway>) -> F) -> T
    where
        F: Future<Output = T>,
    {
        let runtime = self.runtime.get().expect("runtime");
        let services = self.services.get().expect("services");
        runtime.0.block_on(operation(services))
    }

    /// Record the error of a failed step, or the payment of a successful one.
    pub fn record_payment(&self, outcome: Result<Payment, Error>) {
        match outcome {
            Ok(payment) => self.payment.set(payment),
            Err(error) => self.last_error.set(error),
        }
    }

    pub fn sign_in(&self, identity: &Identity, password: &str) -> Result<(), Error> {
        let email: &str = identity.contact_email().as_ref();
        let credentials = LoginCredentials::try_from_parts(email, password)
            .expect("well-formed credentials");
        self.run(|services| async move {
            services.sessions().sign_in(credentials).await.map(|_| ())
        })
    }

    pub fn error(&self) -> Error {
        self.last_error.get().expect("a step should have failed")
    }
}
