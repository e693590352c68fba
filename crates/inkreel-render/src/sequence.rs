//! Whole-storyboard frame rendering, including scene hand-offs.

use inkreel_core::{CanvasSize, FrameBuffer};
use inkreel_ir::{Storyboard, TransitionStyle};
use tracing::debug;

use crate::compositor::SceneCompositor;
use crate::resources::RenderResources;
use crate::timeline::{frames_for_duration, FramePosition, Timeline};
use crate::transition::render_transition_into;

/// Renders frames of a storyboard by global index. When a hand-off length is
/// set, the last frames of each scene whose transition style is not `None`
/// blend into the first frame of the next scene.
pub struct StoryboardRenderer<'a> {
    board: &'a Storyboard,
    compositor: &'a SceneCompositor,
    resources: &'a RenderResources,
    timeline: Timeline,
    canvas: CanvasSize,
    transition_frames: u64,
    outgoing: FrameBuffer,
    incoming: FrameBuffer,
}

impl<'a> StoryboardRenderer<'a> {
    pub fn new(
        board: &'a Storyboard,
        compositor: &'a SceneCompositor,
        resources: &'a RenderResources,
        canvas: CanvasSize,
        fps: u32,
    ) -> Self {
        Self {
            board,
            compositor,
            resources,
            timeline: Timeline::for_scenes(&board.scenes, fps),
            canvas,
            transition_frames: 0,
            outgoing: FrameBuffer::new(canvas.width(), canvas.height()),
            incoming: FrameBuffer::new(canvas.width(), canvas.height()),
        }
    }

    /// Length of the blended hand-off between scenes; 0 means hard cuts.
    pub fn with_transition_ms(mut self, transition_ms: u64) -> Self {
        self.transition_frames = frames_for_duration(transition_ms, self.timeline.fps());
        self
    }

    pub fn timeline(&self) -> &Timeline {
        &self.timeline
    }

    pub fn canvas(&self) -> CanvasSize {
        self.canvas
    }

    /// A blank canvas-sized frame to pass to [`Self::render_into`].
    pub fn new_frame(&self) -> FrameBuffer {
        FrameBuffer::new(self.canvas.width(), self.canvas.height())
    }

    /// Render global frame `index`. `None` past the scheduled frames.
    pub fn render(&mut self, index: u64) -> Option<FrameBuffer> {
        let pos = self.timeline.locate(index)?;
        let mut frame = self.new_frame();
        self.render_into(&mut frame, &pos);
        Some(frame)
    }

    /// Render the frame at `pos` into `frame`, which must be canvas-sized.
    pub fn render_into(&mut self, frame: &mut FrameBuffer, pos: &FramePosition) {
        let Some(scene) = self.board.scenes.get(pos.scene_index) else {
            return;
        };
        let assets = self.board.assets_for(&scene.id);

        let next = self.board.scenes.get(pos.scene_index + 1);
        let window = self.transition_frames.min(pos.scene_frames);
        let blending = match next {
            Some(_) if scene.transition != TransitionStyle::None => {
                window > 0 && pos.frames_remaining() < window
            }
            _ => false,
        };

        let Some(next) = next.filter(|_| blending) else {
            self.compositor
                .render_frame_into(frame, scene, assets, self.resources, pos.progress);
            return;
        };

        // Blend progress runs over (0, 1) so neither endpoint repeats a
        // neighbouring frame.
        let step = window - pos.frames_remaining();
        let t = step as f64 / (window + 1) as f64;
        debug!(
            "frame {}: {} hand-off {} -> {} at {:.3}",
            pos.frame, scene.transition, scene.id, next.id, t
        );
        self.compositor
            .render_frame_into(&mut self.outgoing, scene, assets, self.resources, pos.progress);
        self.compositor.render_frame_into(
            &mut self.incoming,
            next,
            self.board.assets_for(&next.id),
            self.resources,
            0.0,
        );
        render_transition_into(
            frame,
            scene.transition,
            t,
            Some(&self.outgoing),
            Some(&self.incoming),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::text::TextRenderer;
    use inkreel_core::Color;
    use inkreel_ir::{AssetSource, PositionedAsset, Project, Scene, SceneId};

    fn board(transition: TransitionStyle) -> (Storyboard, RenderResources) {
        let red = AssetSource::Builtin("red".into());
        let mut project = Project::new("seq");
        project.add_scene(Scene::new("a", 0, 1_000).with_transition(transition));
        project.add_scene(Scene::new("b", 1, 1_000));
        project.add_asset(&SceneId::new("a"), PositionedAsset::new("r", red.clone()));
        let resources = RenderResources::new().with_asset(red, FrameBuffer::solid(40, 40, &Color::RED));
        (project.storyboard(), resources)
    }

    #[test]
    fn test_hard_cuts_without_transition_ms() {
        let (board, res) = board(TransitionStyle::Fade);
        let compositor = SceneCompositor::new(TextRenderer::new());
        let mut r = StoryboardRenderer::new(&board, &compositor, &res, CanvasSize::even_floor(64, 64), 10);
        assert_eq!(r.timeline().total_frames(), 20);
        let last_a = r.render(9).unwrap();
        assert_eq!(last_a.get_pixel(32, 32), Some([255, 0, 0, 255]));
        let first_b = r.render(10).unwrap();
        assert_eq!(first_b.get_pixel(32, 32), Some([255, 255, 255, 255]));
        assert!(r.render(20).is_none());
    }

    #[test]
    fn test_fade_hand_off_blends_last_frames() {
        let (board, res) = board(TransitionStyle::Fade);
        let compositor = SceneCompositor::new(TextRenderer::new());
        let mut r = StoryboardRenderer::new(&board, &compositor, &res, CanvasSize::even_floor(64, 64), 10)
            .with_transition_ms(300);
        // Frames 7, 8 and 9 blend; 6 is untouched.
        assert_eq!(r.render(6).unwrap().get_pixel(32, 32), Some([255, 0, 0, 255]));
        let [_, g7, ..] = r.render(7).unwrap().get_pixel(32, 32).unwrap();
        let [_, g9, ..] = r.render(9).unwrap().get_pixel(32, 32).unwrap();
        assert!(g7 > 0 && g9 > g7, "g7 {g7}, g9 {g9}");
        assert_eq!(r.render(10).unwrap().get_pixel(32, 32), Some([255, 255, 255, 255]));
    }

    #[test]
    fn test_none_style_never_blends() {
        let (board, res) = board(TransitionStyle::None);
        let compositor = SceneCompositor::new(TextRenderer::new());
        let mut r = StoryboardRenderer::new(&board, &compositor, &res, CanvasSize::even_floor(64, 64), 10)
            .with_transition_ms(300);
        assert_eq!(r.render(9).unwrap().get_pixel(32, 32), Some([255, 0, 0, 255]));
    }
}
