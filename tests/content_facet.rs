// tests/content_facet.rs

//! Integration tests for content facet binding, applicability and search.

mod common;

use common::{Fixture, erratum_ids, rpm_ids, setup};
use conary_facet::backend::memory::{MemoryDispatcher, MemoryRegistry, MemorySource};
use conary_facet::backend::{
    ConsumerRegistry, SqliteConsumerRegistry, SqliteTaskQueue, TaskKind, TaskStatus,
};
use conary_facet::db::models::{
    ContentFacet, ErrataStatus, HostStatus, InstalledPackage, Repository, Rpm, TraceStatus,
};
use conary_facet::facet::run_task;
use conary_facet::search::{matching_host_ids, parse, search_hosts};
use conary_facet::{BindingContext, Error, ImportMode, Nevra};
use std::collections::BTreeSet;

const AGENT: &str = "katello-agent";

fn host_ids(f: &Fixture, query: &str) -> Vec<i64> {
    matching_host_ids(&f.conn, &parse(query).unwrap(), AGENT)
        .unwrap()
        .into_iter()
        .collect()
}

fn make_applicable(f: &Fixture, facet: &ContentFacet) {
    facet
        .set_applicable_errata(&f.conn, &[f.security, f.enhancement])
        .unwrap();
    facet
        .set_applicable_rpms(&f.conn, &[f.rpm_one, f.rpm_two, f.rpm_three])
        .unwrap();
}

#[test]
fn test_installable_is_subset_of_applicable() {
    let f = setup();
    make_applicable(&f, &f.host_one);

    for bound in [vec![], vec![f.view_rhel], vec![f.rhel], vec![f.rhel, f.fedora]] {
        f.host_one.set_bound_repositories(&f.conn, &bound).unwrap();

        let applicable: BTreeSet<_> = erratum_ids(&f.host_one.applicable_errata(&f.conn).unwrap())
            .into_iter()
            .collect();
        let installable: BTreeSet<_> =
            erratum_ids(&f.host_one.installable_errata(&f.conn).unwrap())
                .into_iter()
                .collect();
        assert!(installable.is_subset(&applicable));

        let applicable: BTreeSet<_> = rpm_ids(&f.host_one.applicable_rpms(&f.conn).unwrap())
            .into_iter()
            .collect();
        let installable: BTreeSet<_> = rpm_ids(&f.host_one.installable_rpms(&f.conn).unwrap())
            .into_iter()
            .collect();
        assert!(installable.is_subset(&applicable));
    }
}

#[test]
fn test_nothing_installable_without_bindings() {
    let f = setup();
    make_applicable(&f, &f.host_one);

    assert!(f.host_one.bound_repositories(&f.conn).unwrap().is_empty());
    assert!(f.host_one.installable_errata(&f.conn).unwrap().is_empty());
    assert!(f.host_one.installable_rpms(&f.conn).unwrap().is_empty());
    assert_eq!(f.host_one.applicable_errata(&f.conn).unwrap().len(), 2);
}

#[test]
fn test_narrower_binding_shows_strict_subset() {
    let f = setup();
    make_applicable(&f, &f.host_one);
    f.host_one.bind_repository(&f.conn, f.view_rhel).unwrap();

    assert_eq!(
        erratum_ids(&f.host_one.installable_errata(&f.conn).unwrap()),
        vec![f.security]
    );
    assert_eq!(
        rpm_ids(&f.host_one.installable_rpms(&f.conn).unwrap()),
        vec![f.rpm_one]
    );
    assert_eq!(
        ContentFacet::with_non_installable_errata(&f.conn, &[f.enhancement]).unwrap(),
        vec![f.host_one.clone()]
    );
}

#[test]
fn test_rebinding_to_narrower_view_keeps_applicability() {
    let f = setup();
    f.host_one
        .set_applicable_errata(&f.conn, &[f.enhancement])
        .unwrap();
    f.host_one.set_bound_repositories(&f.conn, &[f.rhel]).unwrap();
    assert_eq!(
        erratum_ids(&f.host_one.installable_errata(&f.conn).unwrap()),
        vec![f.enhancement]
    );

    f.host_one
        .set_bound_repositories(&f.conn, &[f.view_rhel])
        .unwrap();
    assert_eq!(
        erratum_ids(&f.host_one.applicable_errata(&f.conn).unwrap()),
        vec![f.enhancement]
    );
    assert!(f.host_one.installable_errata(&f.conn).unwrap().is_empty());
}

#[test]
fn test_installable_in_alternate_content_source() {
    let f = setup();
    make_applicable(&f, &f.host_one);

    let in_default = f
        .host_one
        .installable_errata_in(&f.conn, f.default_view, f.library)
        .unwrap();
    assert_eq!(erratum_ids(&in_default).len(), 2);

    let in_view = f
        .host_one
        .installable_rpms_in(&f.conn, f.library_dev_view, f.library)
        .unwrap();
    assert_eq!(rpm_ids(&in_view), vec![f.rpm_one]);

    let in_dev = f
        .host_one
        .installable_rpms_in(&f.conn, f.library_dev_view, f.dev)
        .unwrap();
    assert!(in_dev.is_empty());

    assert!(f.host_one.bound_repositories(&f.conn).unwrap().is_empty());
    assert!(f.host_one.installable_errata(&f.conn).unwrap().is_empty());
}

#[test]
fn test_partial_import_replaces_set() {
    let mut f = setup();
    let facet = f.host_one.clone();
    let source = MemorySource::new();

    facet
        .set_applicable_errata(&f.conn, &[f.security])
        .unwrap();
    source.set_errata(facet.host_id, vec!["enhancement-uuid".to_string()]);
    facet
        .import_errata_applicability(&mut f.conn, &source, ImportMode::from_incremental(true))
        .unwrap();
    assert_eq!(
        erratum_ids(&facet.applicable_errata(&f.conn).unwrap()),
        vec![f.enhancement]
    );

    source.set_errata(facet.host_id, vec![]);
    let summary = facet
        .import_errata_applicability(&mut f.conn, &source, ImportMode::Partial)
        .unwrap();
    assert_eq!(summary.removed, 1);
    assert!(facet.applicable_errata(&f.conn).unwrap().is_empty());
}

#[test]
fn test_full_import_of_rpms() {
    let mut f = setup();
    let facet = f.host_one.clone();
    let source = MemorySource::new();
    facet.set_applicable_rpms(&f.conn, &[f.rpm_three]).unwrap();

    source.set_rpms(
        facet.host_id,
        vec![
            "one-1.0-2.el6.x86_64-uuid".to_string(),
            "two-1.0-2.el6.x86_64-uuid".to_string(),
            "missing-uuid".to_string(),
        ],
    );
    let summary = facet
        .import_rpm_applicability(&mut f.conn, &source, ImportMode::Full)
        .unwrap();
    assert_eq!(summary.added, 2);
    assert_eq!(summary.removed, 1);
    assert_eq!(summary.ignored, 1);
    assert_eq!(
        rpm_ids(&facet.applicable_rpms(&f.conn).unwrap()),
        vec![f.rpm_one, f.rpm_two]
    );

    // The other host's snapshot is untouched
    assert!(f.host_two.applicable_rpms(&f.conn).unwrap().is_empty());
}

#[test]
fn test_unreachable_source_preserves_snapshot() {
    let mut f = setup();
    let facet = f.host_one.clone();
    facet.set_applicable_rpms(&f.conn, &[f.rpm_one]).unwrap();

    let source = MemorySource::new();
    source.set_unreachable(true);
    let err = facet
        .import_rpm_applicability(&mut f.conn, &source, ImportMode::Partial)
        .unwrap_err();
    assert!(matches!(err, Error::Import(_)));
    assert_eq!(
        rpm_ids(&facet.applicable_rpms(&f.conn).unwrap()),
        vec![f.rpm_one]
    );
}

#[test]
fn test_update_by_paths_side_effects_once_per_change() {
    let mut f = setup();
    let facet = f.host_one.clone();
    let prefixes = f.prefixes();
    let dispatcher = MemoryDispatcher::new();
    let registry = MemoryRegistry::new();
    let ctx = BindingContext {
        dispatcher: &dispatcher,
        registry: &registry,
        path_prefixes: &prefixes,
    };

    let first = vec![f.path(f.view_rhel)];
    facet
        .update_repositories_by_paths(&mut f.conn, &first, &ctx)
        .unwrap();
    facet
        .update_repositories_by_paths(&mut f.conn, &first, &ctx)
        .unwrap();
    assert_eq!(dispatcher.calls().len(), 1);
    assert_eq!(registry.calls().len(), 1);
    assert_eq!(
        dispatcher.calls()[0],
        (TaskKind::GenerateApplicability, vec![facet.host_ref()])
    );

    let second = vec![f.path(f.view_rhel), f.path(f.dev_fedora)];
    let change = facet
        .update_repositories_by_paths(&mut f.conn, &second, &ctx)
        .unwrap();
    assert_eq!(change.added, vec![f.dev_fedora]);
    assert_eq!(dispatcher.calls().len(), 2);
    assert_eq!(registry.calls().len(), 2);

    let none: Vec<String> = Vec::new();
    let change = facet
        .update_repositories_by_paths(&mut f.conn, &none, &ctx)
        .unwrap();
    assert_eq!(change.removed, vec![f.view_rhel, f.dev_fedora]);
    assert!(facet.bound_repositories(&f.conn).unwrap().is_empty());
    assert_eq!(dispatcher.calls().len(), 3);
    assert_eq!(registry.calls()[2].1, Vec::<String>::new());
}

#[test]
fn test_propagation_uses_library_instances() {
    let mut f = setup();
    let facet = f.host_one.clone();
    let prefixes = f.prefixes();
    let dispatcher = MemoryDispatcher::new();
    let registry = MemoryRegistry::new();
    let ctx = BindingContext {
        dispatcher: &dispatcher,
        registry: &registry,
        path_prefixes: &prefixes,
    };

    let paths = vec![
        f.path(f.rhel),
        f.path(f.view_rhel),
        f.path(f.dev_fedora),
        f.path(f.view_rhel),
    ];
    facet
        .update_repositories_by_paths(&mut f.conn, &paths, &ctx)
        .unwrap();

    assert_eq!(
        registry.calls()[0].1,
        vec![
            "pulp-fedora-17-x86_64".to_string(),
            "pulp-rhel-6-x86_64".to_string()
        ]
    );
    assert_eq!(facet.bound_repository_ids(&f.conn).unwrap().len(), 3);

    let propagated = facet.propagate_repositories(&f.conn, &registry).unwrap();
    assert_eq!(propagated, registry.calls()[0].1);
}

#[test]
fn test_unresolvable_path_leaves_binding() {
    let mut f = setup();
    let facet = f.host_one.clone();
    facet.bind_repository(&f.conn, f.rhel).unwrap();

    let prefixes = f.prefixes();
    let dispatcher = MemoryDispatcher::new();
    let registry = MemoryRegistry::new();
    let ctx = BindingContext {
        dispatcher: &dispatcher,
        registry: &registry,
        path_prefixes: &prefixes,
    };

    let paths = vec![
        f.path(f.fedora),
        "/pulp/repos/ACME_Corporation/library/nope".to_string(),
    ];
    let err = facet
        .update_repositories_by_paths(&mut f.conn, &paths, &ctx)
        .unwrap_err();
    assert!(matches!(err, Error::Resolution(_)));

    let bound: Vec<_> = facet.bound_repository_ids(&f.conn).unwrap().into_iter().collect();
    assert_eq!(bound, vec![f.rhel]);
    assert!(dispatcher.calls().is_empty());
    assert!(registry.calls().is_empty());
}

#[test]
fn test_bind_round_trip() {
    let f = setup();
    f.host_two.bind_repository(&f.conn, f.fedora).unwrap();
    let bound: Vec<_> = f
        .host_two
        .bound_repositories(&f.conn)
        .unwrap()
        .into_iter()
        .map(|r| r.id.unwrap())
        .collect();
    assert_eq!(bound, vec![f.fedora]);
}

#[test]
fn test_sqlite_collaborators_on_shared_database() {
    let mut f = setup();
    let facet = f.host_one.clone();
    let prefixes = f.prefixes();
    let queue = SqliteTaskQueue::open(&f.db_path).unwrap();
    let registry = SqliteConsumerRegistry::open(&f.db_path).unwrap();
    let ctx = BindingContext {
        dispatcher: &queue,
        registry: &registry,
        path_prefixes: &prefixes,
    };

    let paths = vec![f.path(f.view_rhel)];
    facet
        .update_repositories_by_paths(&mut f.conn, &paths, &ctx)
        .unwrap();

    assert_eq!(
        registry.registered(facet.host_id).unwrap(),
        vec!["pulp-rhel-6-x86_64"]
    );
    let tasks = queue.list(Some(TaskStatus::Queued)).unwrap();
    assert_eq!(tasks.len(), 1);
    assert_eq!(tasks[0].kind, TaskKind::GenerateApplicability);
    assert_eq!(tasks[0].hosts, vec![facet.host_ref()]);
    assert_eq!(registry.name(), "sqlite-registry");
}

#[test]
fn test_search_installable_errata_excludes_applicable_only() {
    let f = setup();
    for facet in [&f.host_one, &f.host_two] {
        facet
            .set_applicable_errata(&f.conn, &[f.security, f.enhancement])
            .unwrap();
    }
    f.host_one.bind_repository(&f.conn, f.rhel).unwrap();

    assert_eq!(
        host_ids(&f, "installable_errata = RHEA-2014-111"),
        vec![f.host_one.host_id]
    );
    assert_eq!(
        host_ids(&f, "applicable_errata = RHEA-2014-111"),
        vec![f.host_one.host_id, f.host_two.host_id]
    );
    assert!(host_ids(&f, "installable_errata = RHSA-0000-0000").is_empty());
}

#[test]
fn test_search_content_source_predicates() {
    let f = setup();
    let mut moved = f.host_two.clone();
    moved.content_view_id = f.default_view;
    moved.update(&f.conn).unwrap();

    assert_eq!(
        host_ids(&f, "content_view = library_dev_view"),
        vec![f.host_one.host_id]
    );
    assert_eq!(
        host_ids(&f, &format!("content_view_id = {}", f.default_view)),
        vec![f.host_two.host_id]
    );
    assert_eq!(
        host_ids(&f, "lifecycle_environment = Library").len(),
        2
    );
    assert!(host_ids(&f, &format!("lifecycle_environment_id = {}", f.dev)).is_empty());
    assert_eq!(
        host_ids(
            &f,
            r#"content_view = "Default Organization View" and lifecycle_environment = Library"#
        ),
        vec![f.host_two.host_id]
    );

    let facets = ContentFacet::in_content_view_version_environments(
        &f.conn,
        &[(f.library_dev_version.clone(), vec![f.library])],
    )
    .unwrap();
    assert_eq!(facets, vec![f.host_one.clone()]);
}

#[test]
fn test_search_rpm_and_repository_predicates() {
    let f = setup();
    make_applicable(&f, &f.host_one);
    f.host_one.bind_repository(&f.conn, f.rhel).unwrap();
    InstalledPackage::new(
        f.host_one.host_id,
        "one".to_string(),
        "one-1.0-1.el6.x86_64".to_string(),
    )
    .insert(&f.conn)
    .unwrap();
    InstalledPackage::new(
        f.host_one.host_id,
        "two".to_string(),
        "two-1.0-2.el6.x86_64".to_string(),
    )
    .insert(&f.conn)
    .unwrap();

    let host = vec![f.host_one.host_id];
    assert_eq!(host_ids(&f, "applicable_rpms = three-1.0-2.el6.x86_64"), host);
    assert!(host_ids(&f, "installable_rpms = three-1.0-2.el6.x86_64").is_empty());
    assert_eq!(host_ids(&f, "installable_rpms = two-1.0-2.el6.x86_64"), host);
    assert_eq!(host_ids(&f, "upgradable_rpms = one-1.0-2.el6.x86_64"), host);
    assert!(host_ids(&f, "upgradable_rpms = two-1.0-2.el6.x86_64").is_empty());
    assert_eq!(host_ids(&f, "repository = rhel_6_x86_64"), host);
    assert!(host_ids(&f, "repository = fedora_17_x86_64").is_empty());

    let upgradable = f.host_one.upgradable_rpms(&f.conn).unwrap();
    assert_eq!(rpm_ids(&upgradable), vec![f.rpm_one]);
}

#[test]
fn test_search_status_and_agent_predicates() {
    let mut f = setup();
    let facet = f.host_one.clone();
    facet
        .set_applicable_errata(&f.conn, &[f.security])
        .unwrap();
    facet.bind_repository(&f.conn, f.view_rhel).unwrap();
    assert_eq!(
        facet.refresh_errata_status(&f.conn).unwrap(),
        ErrataStatus::NeededSecurityErrata
    );
    HostStatus::set_trace(&f.conn, f.host_two.host_id, TraceStatus::RequireReboot).unwrap();
    InstalledPackage::new(
        f.host_two.host_id,
        AGENT.to_string(),
        "katello-agent-3.5.0-1.el6.noarch".to_string(),
    )
    .insert(&f.conn)
    .unwrap();

    assert_eq!(
        host_ids(&f, "errata_status = security_needed"),
        vec![f.host_one.host_id]
    );
    assert_eq!(
        host_ids(&f, "errata_status = unknown"),
        vec![f.host_two.host_id]
    );
    assert_eq!(
        host_ids(&f, "trace_status = reboot_needed"),
        vec![f.host_two.host_id]
    );
    assert_eq!(
        host_ids(&f, "agent_installed = true"),
        vec![f.host_two.host_id]
    );
    assert_eq!(
        host_ids(&f, "agent_installed = false"),
        vec![f.host_one.host_id]
    );

    // Once the security erratum leaves the report the status follows
    let source = MemorySource::new();
    facet
        .import_errata_applicability(&mut f.conn, &source, ImportMode::Full)
        .unwrap();
    assert_eq!(host_ids(&f, "errata_status = updated"), vec![f.host_one.host_id]);

    let hosts = search_hosts(&f.conn, "errata_status = updated or unknown", AGENT);
    assert!(matches!(hosts, Err(Error::Search(_))));
}

#[test]
fn test_removed_repository_is_unbound() {
    let f = setup();
    f.host_one.set_bound_repositories(&f.conn, &[f.rhel, f.fedora]).unwrap();
    Repository::delete(&f.conn, f.fedora).unwrap();
    let bound: Vec<_> = f.host_one.bound_repository_ids(&f.conn).unwrap().into_iter().collect();
    assert_eq!(bound, vec![f.rhel]);
}

#[test]
fn test_rebinding_by_paths_to_narrower_view() {
    let mut f = setup();
    let facet = f.host_one.clone();
    let prefixes = f.prefixes();
    let dispatcher = MemoryDispatcher::new();
    let registry = MemoryRegistry::new();
    let ctx = BindingContext {
        dispatcher: &dispatcher,
        registry: &registry,
        path_prefixes: &prefixes,
    };
    facet
        .set_applicable_errata(&f.conn, &[f.enhancement])
        .unwrap();

    let library_paths = vec![f.path(f.rhel)];
    let view_paths = vec![f.path(f.view_rhel)];

    facet
        .update_repositories_by_paths(&mut f.conn, &library_paths, &ctx)
        .unwrap();
    assert_eq!(
        erratum_ids(&facet.installable_errata(&f.conn).unwrap()),
        vec![f.enhancement]
    );

    let change = facet
        .update_repositories_by_paths(&mut f.conn, &view_paths, &ctx)
        .unwrap();
    assert_eq!(change.added, vec![f.view_rhel]);
    assert_eq!(change.removed, vec![f.rhel]);
    assert_eq!(
        erratum_ids(&facet.applicable_errata(&f.conn).unwrap()),
        vec![f.enhancement]
    );
    assert!(facet.installable_errata(&f.conn).unwrap().is_empty());
    assert_eq!(dispatcher.calls().len(), 2);
    assert_eq!(registry.calls().len(), 2);
}

#[test]
fn test_failed_enqueue_during_path_update() {
    let mut f = setup();
    let facet = f.host_one.clone();
    let prefixes = f.prefixes();
    let dispatcher = MemoryDispatcher::new();
    let registry = MemoryRegistry::new();
    let ctx = BindingContext {
        dispatcher: &dispatcher,
        registry: &registry,
        path_prefixes: &prefixes,
    };
    let paths = vec![f.path(f.view_rhel)];

    dispatcher.fail_enqueue(true);
    let err = facet
        .update_repositories_by_paths(&mut f.conn, &paths, &ctx)
        .unwrap_err();
    assert!(matches!(err, Error::Dispatch(_)));

    // Registration and the stored binding went through
    assert_eq!(registry.calls().len(), 1);
    let bound: Vec<_> = facet.bound_repository_ids(&f.conn).unwrap().into_iter().collect();
    assert_eq!(bound, vec![f.view_rhel]);
    assert!(facet.regeneration_pending(&f.conn).unwrap());

    // Still failing: the same paths try again and keep the host pending
    let err = facet
        .update_repositories_by_paths(&mut f.conn, &paths, &ctx)
        .unwrap_err();
    assert!(matches!(err, Error::Dispatch(_)));
    assert!(facet.regeneration_pending(&f.conn).unwrap());

    dispatcher.fail_enqueue(false);
    let change = facet
        .update_repositories_by_paths(&mut f.conn, &paths, &ctx)
        .unwrap();
    assert!(!change.changed());
    assert_eq!(
        dispatcher.calls(),
        vec![(TaskKind::GenerateApplicability, vec![facet.host_ref()])]
    );
    assert_eq!(registry.calls().len(), 1);
    assert!(!facet.regeneration_pending(&f.conn).unwrap());
}

#[test]
fn test_search_upgradable_with_epochs() {
    let f = setup();
    let candidate = Rpm::new(
        "openssl-libs-uuid".to_string(),
        &Nevra::parse("openssl-libs-1:3.0.7-24.el9.x86_64").unwrap(),
    )
    .insert(&f.conn)
    .unwrap();
    Repository::add_rpm(&f.conn, f.rhel, candidate).unwrap();
    f.host_one.add_applicable_rpm(&f.conn, candidate).unwrap();
    f.host_one.bind_repository(&f.conn, f.rhel).unwrap();
    InstalledPackage::new(
        f.host_one.host_id,
        "openssl-libs".to_string(),
        "openssl-libs-3.0.8-1.el9.x86_64".to_string(),
    )
    .insert(&f.conn)
    .unwrap();

    let query = "upgradable_rpms = openssl-libs-3.0.7-24.el9.x86_64";
    assert!(f.host_one.upgradable_rpms(&f.conn).unwrap().is_empty());
    assert!(host_ids(&f, query).is_empty());

    // An installed package with a known lower epoch is upgraded
    InstalledPackage::new(
        f.host_two.host_id,
        "openssl-libs".to_string(),
        "openssl-libs-3.0.8-1.el9.x86_64".to_string(),
    )
    .with_epoch(0)
    .insert(&f.conn)
    .unwrap();
    f.host_two.add_applicable_rpm(&f.conn, candidate).unwrap();
    f.host_two.bind_repository(&f.conn, f.rhel).unwrap();
    assert_eq!(host_ids(&f, query), vec![f.host_two.host_id]);
}

#[test]
fn test_worker_runs_queued_regeneration() {
    let mut f = setup();
    let facet = f.host_one.clone();
    let prefixes = f.prefixes();
    let queue = SqliteTaskQueue::open(&f.db_path).unwrap();
    let registry = SqliteConsumerRegistry::open(&f.db_path).unwrap();
    let ctx = BindingContext {
        dispatcher: &queue,
        registry: &registry,
        path_prefixes: &prefixes,
    };
    facet
        .set_applicable_errata(&f.conn, &[f.security])
        .unwrap();

    let paths = vec![f.path(f.view_rhel)];
    facet
        .update_repositories_by_paths(&mut f.conn, &paths, &ctx)
        .unwrap();
    assert_eq!(
        HostStatus::errata(&f.conn, facet.host_id).unwrap(),
        ErrataStatus::Unknown
    );

    let ran = queue.drain(|task| run_task(&f.conn, task)).unwrap();
    assert_eq!(ran, 1);
    assert_eq!(
        HostStatus::errata(&f.conn, facet.host_id).unwrap(),
        ErrataStatus::NeededSecurityErrata
    );
    let tasks = queue.list(Some(TaskStatus::Completed)).unwrap();
    assert_eq!(tasks.len(), 1);
    assert!(tasks[0].finished_at.is_some());
}
