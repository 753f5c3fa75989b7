//! Scenes every game starts with.

use vellum_serde::{Class, construct};

use crate::impl_scene_object;
use crate::scene::{Scene, SceneControl, SceneState, SceneView};

static SCENE_VIEW: SceneView = SceneView::of::<BaseScene>();
static SPLASH_VIEW: SceneView = SceneView::of::<Splash>();
static TITLE_VIEW: SceneView = SceneView::of::<Title>();

/// The base scene class. Every scene class extends it.
pub static SCENE: Class = Class::new("Scene", construct::<BaseScene>).with_extension(&SCENE_VIEW);

/// The opening splash screen.
pub static SPLASH: Class = Class::new("Splash", construct::<Splash>)
    .extends(&SCENE)
    .with_extension(&SPLASH_VIEW);

/// The title screen.
pub static TITLE: Class = Class::new("Title", construct::<Title>)
    .extends(&SCENE)
    .with_extension(&TITLE_VIEW);

/// A scene that does nothing.
#[derive(Debug, Default)]
pub struct BaseScene {
    state: SceneState,
}

impl_scene_object!(BaseScene, SCENE);

impl Scene for BaseScene {
    fn scene_state(&self) -> &SceneState {
        &self.state
    }

    fn scene_state_mut(&mut self) -> &mut SceneState {
        &mut self.state
    }
}

/// Hands over to the title screen as soon as it is focused.
#[derive(Debug, Default)]
pub struct Splash {
    state: SceneState,
}

impl_scene_object!(Splash, SPLASH);

impl Scene for Splash {
    fn scene_state(&self) -> &SceneState {
        &self.state
    }

    fn scene_state_mut(&mut self) -> &mut SceneState {
        &mut self.state
    }

    fn on_focused(&mut self, control: &mut SceneControl) {
        control.change(&[&TITLE]);
    }
}

/// Leaves as soon as it is focused; nothing lies beyond it yet.
#[derive(Debug, Default)]
pub struct Title {
    state: SceneState,
}

impl_scene_object!(Title, TITLE);

impl Scene for Title {
    fn scene_state(&self) -> &SceneState {
        &self.state
    }

    fn scene_state_mut(&mut self) -> &mut SceneState {
        &mut self.state
    }

    fn on_focused(&mut self, control: &mut SceneControl) {
        control.pop(1);
    }
}
