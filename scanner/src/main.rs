//! Scanner demo binary
//!
//! Wires the full check-in flow against the in-memory store: register an
//! attendee, scan their token, replay it, and feed in garbage, printing the
//! session phase after each scan.

use futures::StreamExt;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use turnstile_core::environment::{SystemClock, UuidGenerator};
use turnstile_core::store::DocumentStore;
use turnstile_core::types::{EventId, StudentId};
use turnstile_scanner::{
    NewRegistration, Registrations, ScanEnvironment, ScanSessionHandle, register,
    watch_attendance_summary,
};
use turnstile_testing::MemoryDocumentStore;

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "turnstile_scanner=debug,turnstile_runtime=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    println!("=== Turnstile: event check-in flow ===\n");

    let store: Arc<dyn DocumentStore> = Arc::new(MemoryDocumentStore::new());
    let registrations = Registrations::new(Arc::clone(&store));
    let event_id = EventId::new("EVT1");

    // Register an attendee; the QR token is issued exactly once here.
    let registration = match register(
        &registrations,
        &UuidGenerator,
        &SystemClock,
        NewRegistration {
            event_id: event_id.clone(),
            name: "Thandi M".to_string(),
            email: "thandi@example.com".to_string(),
            student_id: StudentId::new("S42"),
        },
    )
    .await
    {
        Ok(registration) => registration,
        Err(error) => {
            eprintln!("registration failed: {error}");
            return;
        },
    };

    println!(
        "registered {} — token: {}\n",
        registration.name, registration.qr_code_data
    );

    // A dashboard observer: prints each headcount snapshot as it lands.
    let mut summaries = watch_attendance_summary(&registrations, &event_id);
    let observer = tokio::spawn(async move {
        while let Some(summary) = summaries.next().await {
            match summary {
                Ok(summary) => {
                    println!("[dashboard] attended {}/{}", summary.attended, summary.total);
                },
                Err(error) => eprintln!("[dashboard] stream error: {error}"),
            }
        }
    });

    let session = ScanSessionHandle::new(ScanEnvironment::new(
        Arc::clone(&store),
        Arc::new(SystemClock),
    ));

    let scans = [
        registration.qr_code_data.clone(),
        registration.qr_code_data.clone(),
        "garbage".to_string(),
    ];

    for raw in &scans {
        println!(">>> scanning: {raw}");
        match session
            .scan_to_completion(raw.as_str(), Duration::from_secs(5))
            .await
        {
            Ok(state) => println!("    phase: {:?}\n", state.phase),
            Err(error) => eprintln!("    scan did not settle: {error}\n"),
        }

        if session.reset_session().await.is_err() {
            break;
        }
    }

    match registrations.for_event(&event_id).await {
        Ok(all) => {
            for registration in all {
                println!(
                    "final state: {} attended={} attended_at={:?}",
                    registration.name, registration.has_attended, registration.attended_at
                );
            }
        },
        Err(error) => eprintln!("could not read final state: {error}"),
    }

    if let Err(error) = session.shutdown(Duration::from_secs(5)).await {
        eprintln!("shutdown incomplete: {error}");
    }
    observer.abort();
}
