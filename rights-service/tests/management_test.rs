//! Integration tests for grant management decisions and global checks.

mod common;

use common::TestWorld;
use rights_service::models::Capability;
use rights_service::services::RightsError;
use uuid::Uuid;

// ============================================================================
// Scope of management grants
// ============================================================================

#[tokio::test]
async fn same_level_data_manager_manages_readers_on_its_node_only() {
    let world = TestWorld::spawn().await;
    let manager = world
        .user_with(&world.a, &[Capability::ManageDataAccessesSameLevel])
        .await;
    let reader = world
        .role("Reader", &[Capability::ReadPatientPseudonymized])
        .await;

    let on_node = world
        .engine
        .can_manage(manager.user_id, reader.role_id, world.a.org_node_id, false, world.now)
        .await
        .unwrap();
    let below = world
        .engine
        .can_manage(manager.user_id, reader.role_id, world.a1.org_node_id, false, world.now)
        .await
        .unwrap();

    assert!(on_node);
    assert!(!below);
}

#[tokio::test]
async fn inferior_levels_manager_manages_descendants_only() {
    let world = TestWorld::spawn().await;
    let manager = world
        .user_with(&world.a, &[Capability::ManageDataAccessesInferiorLevels])
        .await;
    let reader = world
        .role("Reader", &[Capability::ReadPatientNominative])
        .await;

    let on_node = world
        .engine
        .can_manage(manager.user_id, reader.role_id, world.a.org_node_id, false, world.now)
        .await
        .unwrap();
    let below = world
        .engine
        .can_manage(manager.user_id, reader.role_id, world.a1.org_node_id, false, world.now)
        .await
        .unwrap();
    let sibling = world
        .engine
        .can_manage(manager.user_id, reader.role_id, world.b.org_node_id, false, world.now)
        .await
        .unwrap();

    assert!(!on_node);
    assert!(below);
    assert!(!sibling);
}

#[tokio::test]
async fn admin_manager_manages_data_managers_and_readers() {
    let world = TestWorld::spawn().await;
    let manager = world
        .user_with(
            &world.root,
            &[
                Capability::ManageAdminAccessesSameLevel,
                Capability::ManageAdminAccessesInferiorLevels,
            ],
        )
        .await;
    let data_manager = world
        .role("Data manager", &[Capability::ManageDataAccessesSameLevel])
        .await;
    let reader = world
        .role("Reader", &[Capability::ReadPatientPseudonymized])
        .await;

    for role in [&data_manager, &reader] {
        for node in [&world.root, &world.a1] {
            assert!(world
                .engine
                .can_manage(manager.user_id, role.role_id, node.org_node_id, false, world.now)
                .await
                .unwrap());
        }
    }
}

#[tokio::test]
async fn data_manager_cannot_assign_data_managers() {
    let world = TestWorld::spawn().await;
    let manager = world
        .user_with(
            &world.root,
            &[
                Capability::ManageDataAccessesSameLevel,
                Capability::ManageDataAccessesInferiorLevels,
            ],
        )
        .await;
    let data_manager = world
        .role("Data manager", &[Capability::ManageDataAccessesInferiorLevels])
        .await;

    let allowed = world
        .engine
        .can_manage(manager.user_id, data_manager.role_id, world.a.org_node_id, false, world.now)
        .await
        .unwrap();

    assert!(!allowed);
}

// ============================================================================
// Roles reserved to full admins
// ============================================================================

#[tokio::test]
async fn only_full_admin_assigns_global_roles() {
    let world = TestWorld::spawn().await;
    let admin_manager = world
        .user_with(&world.root, &[Capability::ManageAdminAccessesSameLevel])
        .await;
    let full_admin = world.user_with(&world.b, &[Capability::FullAdmin]).await;
    let user_manager = world
        .role("User manager", &[Capability::ManageUsers])
        .await;

    let by_admin_manager = world
        .engine
        .can_manage(
            admin_manager.user_id,
            user_manager.role_id,
            world.root.org_node_id,
            false,
            world.now,
        )
        .await
        .unwrap();
    let by_full_admin = world
        .engine
        .can_manage(
            full_admin.user_id,
            user_manager.role_id,
            world.a1.org_node_id,
            false,
            world.now,
        )
        .await
        .unwrap();

    assert!(!by_admin_manager);
    assert!(by_full_admin);
}

#[tokio::test]
async fn extra_grants_never_revoke_full_admin_powers() {
    let world = TestWorld::spawn().await;
    let (user, profile) = world.user("admin").await;
    let admin = world.role("Admin", &[Capability::FullAdmin]).await;
    let reader = world
        .role("Reader", &[Capability::ReadPatientPseudonymized])
        .await;
    world.grant(&profile, &world.root, &admin).await;
    world.grant(&profile, &world.a, &reader).await;

    let allowed = world
        .engine
        .can_manage(user.user_id, admin.role_id, world.a1.org_node_id, false, world.now)
        .await
        .unwrap();

    assert!(allowed);
}

// ============================================================================
// Export management
// ============================================================================

#[tokio::test]
async fn export_roles_need_export_management_anywhere() {
    let world = TestWorld::spawn().await;
    let (manager, profile) = world.user("manager").await;
    let data_manager = world
        .role("Data manager", &[Capability::ManageDataAccessesSameLevel])
        .await;
    world.grant(&profile, &world.a, &data_manager).await;
    let exporter = world
        .role(
            "Exporter",
            &[
                Capability::ReadPatientNominative,
                Capability::ExportCsvNominative,
            ],
        )
        .await;

    let before = world
        .engine
        .can_manage(manager.user_id, exporter.role_id, world.a.org_node_id, false, world.now)
        .await
        .unwrap();

    let export_manager = world
        .role("Export manager", &[Capability::ManageExportCsvAccesses])
        .await;
    world.grant(&profile, &world.b, &export_manager).await;

    let after = world
        .engine
        .can_manage(manager.user_id, exporter.role_id, world.a.org_node_id, false, world.now)
        .await
        .unwrap();

    assert!(!before);
    assert!(after);
}

// ============================================================================
// Read-only decisions
// ============================================================================

#[tokio::test]
async fn read_variant_allows_viewing_but_not_editing() {
    let world = TestWorld::spawn().await;
    let viewer = world
        .user_with(&world.a, &[Capability::ReadDataAccessesSameLevel])
        .await;
    let reader = world
        .role("Reader", &[Capability::ReadPatientPseudonymized])
        .await;

    let edit = world
        .engine
        .can_manage(viewer.user_id, reader.role_id, world.a.org_node_id, false, world.now)
        .await
        .unwrap();
    let view = world
        .engine
        .can_manage(viewer.user_id, reader.role_id, world.a.org_node_id, true, world.now)
        .await
        .unwrap();

    assert!(!edit);
    assert!(view);
}

#[tokio::test]
async fn manage_variant_allows_viewing() {
    let world = TestWorld::spawn().await;
    let manager = world
        .user_with(&world.a, &[Capability::ManageDataAccessesSameLevel])
        .await;
    let reader = world
        .role("Reader", &[Capability::ReadPatientPseudonymized])
        .await;

    let view = world
        .engine
        .can_manage(manager.user_id, reader.role_id, world.a.org_node_id, true, world.now)
        .await
        .unwrap();

    assert!(view);
}

// ============================================================================
// Failure cases
// ============================================================================

#[tokio::test]
async fn user_without_grants_manages_nothing() {
    let world = TestWorld::spawn().await;
    let (user, _) = world.user("nobody").await;
    let reader = world
        .role("Reader", &[Capability::ReadPatientPseudonymized])
        .await;

    let allowed = world
        .engine
        .can_manage(user.user_id, reader.role_id, world.a.org_node_id, false, world.now)
        .await
        .unwrap();

    assert!(!allowed);
}

#[tokio::test]
async fn deleted_target_is_refused_even_for_full_admin() {
    let world = TestWorld::spawn().await;
    let admin = world.user_with(&world.root, &[Capability::FullAdmin]).await;
    let reader = world
        .role("Reader", &[Capability::ReadPatientPseudonymized])
        .await;
    world
        .store
        .mark_node_deleted(world.a.org_node_id, world.now)
        .await
        .unwrap();

    let allowed = world
        .engine
        .can_manage(admin.user_id, reader.role_id, world.a1.org_node_id, false, world.now)
        .await
        .unwrap();

    assert!(!allowed);
}

#[tokio::test]
async fn unknown_role_node_and_user_are_not_found() {
    let world = TestWorld::spawn().await;
    let admin = world.user_with(&world.root, &[Capability::FullAdmin]).await;
    let reader = world
        .role("Reader", &[Capability::ReadPatientPseudonymized])
        .await;
    let unknown = Uuid::new_v4();

    let role_err = world
        .engine
        .can_manage(admin.user_id, unknown, world.a.org_node_id, false, world.now)
        .await
        .unwrap_err();
    let node_err = world
        .engine
        .can_manage(admin.user_id, reader.role_id, unknown, false, world.now)
        .await
        .unwrap_err();
    let user_err = world
        .engine
        .can_manage(unknown, reader.role_id, world.a.org_node_id, false, world.now)
        .await
        .unwrap_err();

    assert!(matches!(role_err, RightsError::RoleNotFound(_)));
    assert!(matches!(node_err, RightsError::NodeNotFound(_)));
    assert!(matches!(user_err, RightsError::UserNotFound(_)));
}

// ============================================================================
// Global checks
// ============================================================================

#[tokio::test]
async fn global_checks_follow_held_capabilities() {
    let world = TestWorld::spawn().await;
    let auditor = world.user_with(&world.a1, &[Capability::ReadLogs]).await;
    let admin = world.user_with(&world.root, &[Capability::FullAdmin]).await;

    assert!(world.engine.can_read_logs(auditor.user_id, world.now).await.unwrap());
    assert!(!world.engine.can_manage_users(auditor.user_id, world.now).await.unwrap());
    assert!(!world.engine.can_manage_roles(auditor.user_id, world.now).await.unwrap());

    assert!(world.engine.can_read_logs(admin.user_id, world.now).await.unwrap());
    assert!(world.engine.can_manage_users(admin.user_id, world.now).await.unwrap());
    assert!(world.engine.can_manage_roles(admin.user_id, world.now).await.unwrap());
}

#[tokio::test]
async fn global_capability_on_deleted_node_is_not_held() {
    let world = TestWorld::spawn().await;
    let manager = world.user_with(&world.a1, &[Capability::ManageRoles]).await;
    world
        .store
        .mark_node_deleted(world.a1.org_node_id, world.now)
        .await
        .unwrap();

    assert!(!world.engine.can_manage_roles(manager.user_id, world.now).await.unwrap());
}

#[tokio::test]
async fn nominative_read_anywhere() {
    let world = TestWorld::spawn().await;
    let nominative = world
        .user_with(&world.a1, &[Capability::ReadPatientNominative])
        .await;
    let pseudo = world
        .user_with(&world.a1, &[Capability::ReadPatientPseudonymized])
        .await;

    assert!(world
        .engine
        .has_any_nominative_read(nominative.user_id, world.now)
        .await
        .unwrap());
    assert!(!world
        .engine
        .has_any_nominative_read(pseudo.user_id, world.now)
        .await
        .unwrap());
}
