//! Built-in seed set loaded into an empty knowledge base.

use triage_core::{KnowledgeEntry, KnowledgeEntryId, Severity};

/// Seed entries with fixed ids, so re-seeding overwrites instead of duplicating.
pub fn seed_entries() -> Vec<KnowledgeEntry> {
    vec![
        KnowledgeEntry::new(
            "Database connection pool exhausted",
            "DATABASE_CONNECTION_ERROR",
            Severity::High,
            "Database connection timeout errors, requests queue up waiting for a connection, pool usage at 100%",
            "Connection pool too small for peak traffic or connections leaked by long-running transactions",
            "Increase the maximum pool size, kill idle-in-transaction sessions and restart the affected service",
        )
        .with_id(KnowledgeEntryId::from("seed_database_connection_error"))
        .with_confidence(0.95)
        .with_success_rate(0.9)
        .with_resolution_time(30)
        .with_technologies(["postgresql", "hikaricp"])
        .with_environments(["production"])
        .with_tags(["database", "connection-pool"])
        .with_verification_steps(vec![
            "Pool usage back below 80%".to_string(),
            "No new connection timeout errors for 10 minutes".to_string(),
        ]),
        KnowledgeEntry::new(
            "Java heap space exhausted",
            "OUT_OF_MEMORY",
            Severity::High,
            "OutOfMemoryError: Java heap space, long GC pauses, pods restarted by the OOM killer",
            "Heap sized below the working set or an unbounded in-memory cache",
            "Capture a heap dump, raise the heap limit and bound the offending cache",
        )
        .with_id(KnowledgeEntryId::from("seed_out_of_memory"))
        .with_confidence(0.9)
        .with_success_rate(0.85)
        .with_resolution_time(45)
        .with_technologies(["jvm", "kubernetes"])
        .with_tags(["memory", "gc"])
        .with_prerequisites(vec!["Heap dump storage available".to_string()]),
        KnowledgeEntry::new(
            "Disk space exhausted",
            "DISK_FULL",
            Severity::Medium,
            "No space left on device, writes failing, disk usage above 95%",
            "Log files not rotated or old artifacts never cleaned up",
            "Rotate and compress logs, delete stale artifacts and enable log rotation",
        )
        .with_id(KnowledgeEntryId::from("seed_disk_full"))
        .with_confidence(0.9)
        .with_success_rate(0.95)
        .with_resolution_time(15)
        .with_technologies(["linux", "logrotate"])
        .with_tags(["disk", "storage"]),
        KnowledgeEntry::new(
            "Sustained high CPU usage",
            "HIGH_CPU_USAGE",
            Severity::Medium,
            "CPU usage above 90% for several minutes, increased latency, throttling alerts",
            "Hot loop or inefficient query after a deploy, or traffic spike beyond capacity",
            "Profile the hot path, roll back the latest deploy if correlated and scale out",
        )
        .with_id(KnowledgeEntryId::from("seed_high_cpu_usage"))
        .with_confidence(0.75)
        .with_success_rate(0.7)
        .with_resolution_time(60)
        .with_tags(["cpu", "performance"]),
        KnowledgeEntry::new(
            "Downstream API timeouts",
            "NETWORK_TIMEOUT",
            Severity::Medium,
            "Read timed out calling downstream service, retries piling up, circuit breaker open",
            "Downstream service degraded or network partition between zones",
            "Check downstream health, fail over to a healthy zone and tune timeouts and retries",
        )
        .with_id(KnowledgeEntryId::from("seed_network_timeout"))
        .with_confidence(0.7)
        .with_success_rate(0.75)
        .with_resolution_time(40)
        .with_tags(["network", "timeout"]),
        KnowledgeEntry::new(
            "Expired TLS certificate",
            "CERTIFICATE_EXPIRED",
            Severity::High,
            "TLS handshake failures, certificate has expired errors in clients",
            "Certificate renewal job failed or was never configured",
            "Renew the certificate, deploy it to all endpoints and fix the renewal job",
        )
        .with_id(KnowledgeEntryId::from("seed_certificate_expired"))
        .with_confidence(0.95)
        .with_success_rate(0.98)
        .with_resolution_time(20)
        .with_technologies(["tls", "cert-manager"])
        .with_tags(["security", "certificates"]),
        KnowledgeEntry::new(
            "Slow UI response",
            "PERFORMANCE_DEGRADATION",
            Severity::Low,
            "Pages load slowly, p95 latency doubled, no errors reported",
            "Missing database index or cold caches after a restart",
            "Check slow query log, add the missing index and warm caches",
        )
        .with_id(KnowledgeEntryId::from("seed_performance_degradation"))
        .with_confidence(0.6)
        .with_success_rate(0.65)
        .with_resolution_time(90)
        .with_tags(["latency"]),
    ]
}
