//! 3D scene management
//!
//! Applies the session's queued [`SceneOp`]s to the ECS world and keeps the
//! render loop, host commands and screen-space labels in step with it.

use bevy::prelude::*;
use bevy::winit::{UpdateMode, WinitSettings};
use std::collections::{HashMap, HashSet};
use std::time::Duration;

use crate::builder::{box_edges, ObjectKey, SceneObject};
use crate::camera::MainCamera;
use crate::fetcher::{DataSource, PendingFetches};
use crate::lifecycle::{viewer_is_open, HostCommand, HostPanel, LoopControl, RenderLoop, ViewerLink};
use crate::state::{SceneOp, WarehouseViewerSession};

/// Ordering of the viewer's Update systems
#[derive(SystemSet, Debug, Clone, PartialEq, Eq, Hash)]
pub enum ViewerSet {
    /// Host commands and fetch completions
    Sync,
    /// Pointer, wheel and keyboard handling
    Input,
    /// Scene op application
    Apply,
}

/// Host panel callbacks, only reachable from the main thread
pub struct HostPanelHandle(pub Box<dyn HostPanel>);

/// Root of a spawned scene object, or one of its labels
#[derive(Component)]
pub struct SceneObjectTag {
    pub key: ObjectKey,
}

/// Assets owned by a scene object, freed when it is detached
#[derive(Component, Clone, Default)]
pub struct ObjectAssets {
    pub meshes: Vec<Handle<Mesh>>,
    pub materials: Vec<Handle<StandardMaterial>>,
}

/// Screen-space label pinned to a world position
#[derive(Component)]
pub struct ObjectLabelAnchor {
    pub world: Vec3,
}

/// Marker for the floor
#[derive(Component)]
pub struct GroundPlane;

pub struct SceneSetupPlugin;

impl Plugin for SceneSetupPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<RenderLoop>()
            .configure_sets(Update, (ViewerSet::Sync, ViewerSet::Input, ViewerSet::Apply).chain())
            .add_systems(Startup, setup_scene)
            .add_systems(First, drive_render_loop)
            .add_systems(
                Update,
                (process_host_commands, process_fetches)
                    .chain()
                    .in_set(ViewerSet::Sync),
            )
            .add_systems(Update, apply_scene_ops.in_set(ViewerSet::Apply))
            .add_systems(PostUpdate, update_labels.run_if(viewer_is_open));
    }
}

fn setup_scene(
    mut commands: Commands,
    mut meshes: ResMut<Assets<Mesh>>,
    mut materials: ResMut<Assets<StandardMaterial>>,
    mut session: ResMut<WarehouseViewerSession>,
) {
    commands.spawn((
        Camera3d::default(),
        Projection::Perspective(PerspectiveProjection {
            fov: session.camera.fov_y,
            near: 0.1,
            far: 500.0,
            ..default()
        }),
        session.camera.transform(),
        MainCamera,
    ));

    commands.insert_resource(AmbientLight {
        color: Color::srgb(0.9, 0.95, 1.0),
        brightness: 300.0,
        ..default()
    });

    commands.spawn((
        DirectionalLight {
            illuminance: 6000.0,
            shadows_enabled: true,
            ..default()
        },
        Transform::from_xyz(20.0, 40.0, 20.0).looking_at(Vec3::ZERO, Vec3::Y),
    ));

    commands.spawn((
        PointLight {
            intensity: 200000.0,
            shadows_enabled: false,
            color: Color::srgb(1.0, 0.95, 0.9),
            range: 80.0,
            ..default()
        },
        Transform::from_xyz(-15.0, 12.0, -10.0),
    ));

    commands.spawn((
        Mesh3d(meshes.add(Plane3d::default().mesh().size(100.0, 100.0))),
        MeshMaterial3d(materials.add(StandardMaterial {
            base_color: Color::srgb(0.85, 0.86, 0.88),
            perceptual_roughness: 1.0,
            ..default()
        })),
        Transform::default(),
        GroundPlane,
    ));

    session.load_racks();
}

/// Frame head: suspend continuous rendering while the viewer is closed
fn drive_render_loop(
    link: Res<ViewerLink>,
    mut render_loop: ResMut<RenderLoop>,
    mut winit_settings: ResMut<WinitSettings>,
) {
    let was_running = render_loop.is_running();
    match render_loop.tick(link.is_open()) {
        LoopControl::Continue if !was_running => {
            *winit_settings = WinitSettings::game();
        }
        LoopControl::Stop if was_running => {
            // Still wake up now and then so host commands get picked up
            winit_settings.focused_mode = UpdateMode::reactive_low_power(Duration::from_millis(500));
            winit_settings.unfocused_mode = UpdateMode::reactive_low_power(Duration::from_millis(500));
        }
        _ => {}
    }
}

/// Apply host commands. Teardown empties the scene but keeps the app, which
/// cannot be rebuilt once the event loop exists; the next open starts over.
fn process_host_commands(link: Res<ViewerLink>, mut session: ResMut<WarehouseViewerSession>) {
    for command in link.drain() {
        match command {
            HostCommand::Open(size) => {
                session.activate();
                session.camera.set_viewport(size.width as f32, size.height as f32);
                if session.ensure_racks_loaded() {
                    tracing::info!("Reloading racks for a fresh session");
                }
            }
            HostCommand::Close => session.deactivate(),
            HostCommand::Resize(size) => {
                session.camera.set_viewport(size.width as f32, size.height as f32);
            }
            HostCommand::Teardown => {
                session.reset();
                tracing::info!("Viewer session torn down");
            }
        }
    }
}

fn process_fetches(pending: Res<PendingFetches>, mut session: ResMut<WarehouseViewerSession>) {
    for outcome in pending.drain() {
        session.complete_fetch(outcome);
    }
}

/// Entities and assets spawned earlier in the current op batch. They are not
/// visible to the object query until commands are applied.
#[derive(Default)]
struct BatchSpawns(HashMap<ObjectKey, (Vec<Entity>, ObjectAssets)>);

impl BatchSpawns {
    fn discard(
        &mut self,
        commands: &mut Commands,
        meshes: &mut Assets<Mesh>,
        materials: &mut Assets<StandardMaterial>,
        matches: impl Fn(&ObjectKey) -> bool,
    ) {
        let keys: Vec<ObjectKey> = self.0.keys().filter(|k| matches(k)).copied().collect();
        for key in keys {
            let Some((entities, assets)) = self.0.remove(&key) else {
                continue;
            };
            free_assets(meshes, materials, &assets);
            for entity in entities {
                commands.entity(entity).despawn();
            }
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn apply_scene_ops(
    mut commands: Commands,
    mut session: ResMut<WarehouseViewerSession>,
    mut meshes: ResMut<Assets<Mesh>>,
    mut materials: ResMut<Assets<StandardMaterial>>,
    objects: Query<(Entity, &SceneObjectTag, Option<&ObjectAssets>)>,
    panel: Option<NonSend<HostPanelHandle>>,
    source: Res<DataSource>,
    pending: Res<PendingFetches>,
) {
    let ops = session.take_ops();
    if ops.is_empty() {
        return;
    }
    let mut despawned = HashSet::new();
    let mut spawned = BatchSpawns::default();

    for op in ops {
        match op {
            SceneOp::Attach(object) => {
                let key = object.key();
                despawn_matching(
                    &mut commands,
                    &mut meshes,
                    &mut materials,
                    &objects,
                    &mut despawned,
                    |k| *k == key,
                );
                spawned.discard(&mut commands, &mut meshes, &mut materials, |k| *k == key);
                let entry = spawn_object(&mut commands, &mut meshes, &mut materials, &object);
                spawned.0.insert(key, entry);
            }
            SceneOp::Detach(kind) => {
                despawn_matching(
                    &mut commands,
                    &mut meshes,
                    &mut materials,
                    &objects,
                    &mut despawned,
                    |k| k.kind() == kind,
                );
                spawned.discard(&mut commands, &mut meshes, &mut materials, |k| k.kind() == kind);
            }
            SceneOp::ShowInfoPanel(info) => {
                if let Some(panel) = &panel {
                    panel.0.show_info_panel(&info);
                }
            }
            SceneOp::HideInfoPanel => {
                if let Some(panel) = &panel {
                    panel.0.hide_info_panel();
                }
            }
            SceneOp::SetLoading(visible) => {
                if let Some(panel) = &panel {
                    panel.0.set_loading(visible);
                }
            }
            SceneOp::Fetch(request) => {
                tracing::debug!(?request, "Dispatching fetch");
                source.0.fetch(request, pending.clone());
            }
        }
    }
}

fn free_assets(meshes: &mut Assets<Mesh>, materials: &mut Assets<StandardMaterial>, assets: &ObjectAssets) {
    for mesh in &assets.meshes {
        meshes.remove(mesh.id());
    }
    for material in &assets.materials {
        materials.remove(material.id());
    }
}

/// Despawn matching objects and free their assets. Entities already in
/// `despawned` are skipped.
fn despawn_matching(
    commands: &mut Commands,
    meshes: &mut Assets<Mesh>,
    materials: &mut Assets<StandardMaterial>,
    objects: &Query<(Entity, &SceneObjectTag, Option<&ObjectAssets>)>,
    despawned: &mut HashSet<Entity>,
    matches: impl Fn(&ObjectKey) -> bool,
) {
    for (entity, tag, assets) in objects.iter() {
        if !matches(&tag.key) || !despawned.insert(entity) {
            continue;
        }
        if let Some(assets) = assets {
            free_assets(meshes, materials, assets);
        }
        commands.entity(entity).despawn();
    }
}

/// Spawn an object with its outline and label. Returns the tagged entities
/// and the assets they own.
fn spawn_object(
    commands: &mut Commands,
    meshes: &mut Assets<Mesh>,
    materials: &mut Assets<StandardMaterial>,
    object: &SceneObject,
) -> (Vec<Entity>, ObjectAssets) {
    let key = object.key();
    let mut assets = ObjectAssets::default();

    let body_mesh = meshes.add(Cuboid::from_size(object.size));
    let body_material = materials.add(StandardMaterial {
        base_color: object.color,
        perceptual_roughness: 0.7,
        ..default()
    });
    assets.meshes.push(body_mesh.clone());
    assets.materials.push(body_material.clone());

    let mut edges = Vec::new();
    if object.outlined {
        let edge_material = materials.add(StandardMaterial {
            base_color: Color::srgb(0.1, 0.1, 0.12),
            unlit: true,
            ..default()
        });
        assets.materials.push(edge_material.clone());
        for (center, dimensions) in box_edges(object.size) {
            let mesh = meshes.add(Cuboid::from_size(dimensions));
            assets.meshes.push(mesh.clone());
            edges.push((mesh, edge_material.clone(), object.mesh_offset + center));
        }
    }

    let mesh_offset = object.mesh_offset;
    let mut entities = Vec::with_capacity(2);
    let root = commands
        .spawn((object.transform, Visibility::default(), SceneObjectTag { key }, assets.clone()))
        .with_children(|parent| {
            parent.spawn((
                Mesh3d(body_mesh),
                MeshMaterial3d(body_material),
                Transform::from_translation(mesh_offset),
            ));
            for (mesh, material, offset) in edges {
                parent.spawn((Mesh3d(mesh), MeshMaterial3d(material), Transform::from_translation(offset)));
            }
        })
        .id();
    entities.push(root);

    if let (Some(label), Some(world)) = (&object.label, object.label_anchor()) {
        let label_entity = commands
            .spawn((
                Text::new(label.text.clone()),
                TextFont {
                    font_size: 14.0,
                    ..default()
                },
                TextColor(Color::WHITE),
                Node {
                    position_type: PositionType::Absolute,
                    ..default()
                },
                Visibility::Hidden,
                ObjectLabelAnchor { world },
                SceneObjectTag { key },
            ))
            .id();
        entities.push(label_entity);
    }

    (entities, assets)
}

/// Move labels to the screen position of their anchors
fn update_labels(
    camera: Query<(&Camera, &GlobalTransform), With<MainCamera>>,
    mut labels: Query<(&ObjectLabelAnchor, &mut Node, &mut Visibility)>,
) {
    let Ok((camera, camera_transform)) = camera.single() else {
        return;
    };
    for (anchor, mut node, mut visibility) in labels.iter_mut() {
        match camera.world_to_viewport(camera_transform, anchor.world) {
            Ok(position) => {
                node.left = Val::Px(position.x);
                node.top = Val::Px(position.y);
                *visibility = Visibility::Inherited;
            }
            Err(_) => *visibility = Visibility::Hidden,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::ObjectKind;
    use crate::fetcher::{FetchRequest, StaticDataSource};
    use crate::lifecycle::SurfaceSize;
    use std::sync::Arc;
    use vuestock_core::Rack;

    /// Meshes of one outlined box: body plus 12 edge bars
    const MESHES_PER_OUTLINED_OBJECT: usize = 13;

    fn test_app(source: Arc<StaticDataSource>) -> App {
        let mut app = App::new();
        app.add_plugins(MinimalPlugins)
            .add_plugins(AssetPlugin::default())
            .init_asset::<Mesh>()
            .init_asset::<StandardMaterial>()
            .init_resource::<WarehouseViewerSession>()
            .init_resource::<PendingFetches>()
            .init_resource::<RenderLoop>()
            .insert_resource(WinitSettings::default())
            .insert_resource(DataSource(source))
            .insert_resource(ViewerLink::default())
            .add_systems(First, drive_render_loop)
            .add_systems(
                Update,
                (process_host_commands, process_fetches, apply_scene_ops).chain(),
            );
        app
    }

    fn count(app: &mut App, kind: ObjectKind) -> usize {
        let mut query = app.world_mut().query::<&SceneObjectTag>();
        query
            .iter(app.world())
            .filter(|tag| tag.key.kind() == kind)
            .count()
    }

    fn send(app: &mut App, command: HostCommand) {
        app.world().resource::<ViewerLink>().send(command);
        app.update();
    }

    fn session(app: &App) -> &WarehouseViewerSession {
        app.world().resource::<WarehouseViewerSession>()
    }

    #[test]
    fn test_racks_spawn_and_dispose() {
        let mut app = test_app(Arc::new(StaticDataSource::demo()));
        app.world_mut()
            .resource_mut::<WarehouseViewerSession>()
            .load_racks();

        // Dispatch, then apply the completion
        app.update();
        app.update();
        app.update();

        // 4 racks, each with a label entity
        assert_eq!(count(&mut app, ObjectKind::Rack), 8);
        assert!(app.world().resource::<Assets<Mesh>>().len() > 0);

        app.world_mut()
            .resource_mut::<WarehouseViewerSession>()
            .reset();
        app.update();

        assert_eq!(count(&mut app, ObjectKind::Rack), 0);
        assert_eq!(app.world().resource::<Assets<Mesh>>().len(), 0);
        assert_eq!(app.world().resource::<Assets<StandardMaterial>>().len(), 0);
    }

    #[test]
    fn test_open_and_close_drive_session_and_loop() {
        let mut app = test_app(Arc::new(StaticDataSource::demo()));
        app.update();
        assert!(!app.world().resource::<RenderLoop>().is_running());

        send(&mut app, HostCommand::Open(SurfaceSize::new(800, 400)));
        assert!(session(&app).is_active());
        assert_eq!(session(&app).camera.aspect, 2.0);

        // The loop picks the open flag up at the head of the next frame
        app.update();
        assert!(app.world().resource::<RenderLoop>().is_running());
        assert!(matches!(
            app.world().resource::<WinitSettings>().focused_mode,
            UpdateMode::Continuous
        ));

        send(&mut app, HostCommand::Close);
        assert!(!session(&app).is_active());
        assert!(!app.world().resource::<RenderLoop>().is_running());
        assert!(matches!(
            app.world().resource::<WinitSettings>().focused_mode,
            UpdateMode::Reactive { .. }
        ));
    }

    #[test]
    fn test_teardown_then_open_reloads_racks() {
        let source = Arc::new(StaticDataSource::demo());
        let mut app = test_app(source.clone());

        send(&mut app, HostCommand::Open(SurfaceSize::new(800, 600)));
        app.update();
        assert_eq!(count(&mut app, ObjectKind::Rack), 8);
        assert_eq!(source.requests(), vec![FetchRequest::Racks]);

        send(&mut app, HostCommand::Teardown);
        assert!(!session(&app).is_active());
        assert!(session(&app).objects().is_empty());
        assert_eq!(count(&mut app, ObjectKind::Rack), 0);
        assert_eq!(app.world().resource::<Assets<Mesh>>().len(), 0);

        send(&mut app, HostCommand::Open(SurfaceSize::new(800, 600)));
        app.update();
        assert!(session(&app).is_active());
        assert_eq!(count(&mut app, ObjectKind::Rack), 8);
        assert_eq!(
            source.requests(),
            vec![FetchRequest::Racks, FetchRequest::Racks]
        );

        // A plain reopen keeps what is loaded
        send(&mut app, HostCommand::Close);
        send(&mut app, HostCommand::Open(SurfaceSize::new(800, 600)));
        assert_eq!(source.requests().len(), 2);
    }

    #[test]
    fn test_duplicate_rows_spawn_one_object() {
        let source = StaticDataSource::new(
            vec![Rack::new(1, "A1"), Rack::new(1, "A1")],
            Vec::new(),
            Vec::new(),
        );
        let mut app = test_app(Arc::new(source));

        send(&mut app, HostCommand::Open(SurfaceSize::new(800, 600)));
        app.update();

        assert_eq!(session(&app).objects().racks.len(), 1);
        // Root and label
        assert_eq!(count(&mut app, ObjectKind::Rack), 2);
        assert_eq!(
            app.world().resource::<Assets<Mesh>>().len(),
            MESHES_PER_OUTLINED_OBJECT
        );
        assert_eq!(app.world().resource::<Assets<StandardMaterial>>().len(), 2);
    }
}
