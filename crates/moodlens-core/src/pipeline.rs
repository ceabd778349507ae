//! One frame through locate → select → crop → classify → interpret → overlay.

use crate::classifier::{Classifier, ClassifierError};
use crate::interpreter::{interpret, InterpretError};
use crate::locator::{FaceLocator, LocatorError};
use crate::overlay::Overlay;
use crate::preprocess::{crop_normalize, PreprocessError};
use crate::selector::select_faces;
use crate::types::{ClassLabels, FaceDetection};
use image::RgbImage;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("locator: {0}")]
    Locator(#[from] LocatorError),
    #[error("preprocess: {0}")]
    Preprocess(#[from] PreprocessError),
    #[error("classifier: {0}")]
    Classifier(#[from] ClassifierError),
    #[error("scores: {0}")]
    Interpret(#[from] InterpretError),
}

/// The assembled per-frame pipeline.
pub struct FramePipeline {
    locator: Box<dyn FaceLocator>,
    classifier: Box<dyn Classifier>,
    labels: ClassLabels,
    overlay: Overlay,
    max_faces: usize,
}

impl FramePipeline {
    pub fn new(
        locator: Box<dyn FaceLocator>,
        classifier: Box<dyn Classifier>,
        labels: ClassLabels,
        overlay: Overlay,
        max_faces: usize,
    ) -> Self {
        Self {
            locator,
            classifier,
            labels,
            overlay,
            max_faces,
        }
    }

    /// Classify the largest faces in `surface` and annotate it in place.
    ///
    /// Boxes with no area or reaching past the frame are ignored. All crops
    /// are taken before anything is drawn, so one face's label never bleeds
    /// into another face's crop. On error nothing is drawn.
    pub fn process(&mut self, surface: &mut RgbImage) -> Result<Vec<FaceDetection>, PipelineError> {
        let gray = image::imageops::grayscale(&*surface);
        let located = self.locator.locate(&gray)?;
        let (width, height) = surface.dimensions();
        let usable: Vec<_> = located
            .iter()
            .copied()
            .filter(|r| !r.is_empty() && r.fits_within(width, height))
            .collect();
        if usable.len() < located.len() {
            tracing::debug!(
                dropped = located.len() - usable.len(),
                "ignoring empty or out-of-frame face boxes"
            );
        }
        let selected = select_faces(&usable, self.max_faces);

        let mut detections = Vec::with_capacity(selected.len());
        for rect in selected {
            let tensor = crop_normalize(surface, &rect)?;
            let logits = self.classifier.run(tensor)?;
            let result = interpret(&logits, &self.labels)?;
            detections.push(FaceDetection { rect, result });
        }

        tracing::debug!(
            located = located.len(),
            classified = detections.len(),
            "frame processed"
        );

        self.overlay.draw(surface, &detections);
        Ok(detections)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::preprocess::Tensor;
    use crate::types::Rectangle;
    use image::{GrayImage, Rgb};

    struct FixedLocator(Vec<Rectangle>);

    impl FaceLocator for FixedLocator {
        fn locate(&mut self, _gray: &GrayImage) -> Result<Vec<Rectangle>, LocatorError> {
            Ok(self.0.clone())
        }
    }

    /// Scores red-dominant crops as class 0 and everything else as class 1.
    struct RednessClassifier;

    impl Classifier for RednessClassifier {
        fn run(&mut self, input: Tensor) -> Result<Vec<f32>, ClassifierError> {
            let red: f32 = input.plane(0).sum();
            let green: f32 = input.plane(1).sum();
            Ok(if red > green { vec![3.0, 0.0] } else { vec![0.0, 3.0] })
        }
    }

    struct FailingClassifier;

    impl Classifier for FailingClassifier {
        fn run(&mut self, _input: Tensor) -> Result<Vec<f32>, ClassifierError> {
            Err(ClassifierError::InferenceFailed("boom".into()))
        }
    }

    fn labels() -> ClassLabels {
        ClassLabels::new(vec!["angry".into(), "neutral".into()])
    }

    /// Left half red, right half green.
    fn split_frame() -> RgbImage {
        RgbImage::from_fn(200, 100, |x, _| if x < 100 { Rgb([255, 0, 0]) } else { Rgb([0, 255, 0]) })
    }

    #[test]
    fn test_classifies_largest_faces_in_order() {
        let small = Rectangle::new(10, 40, 30, 30);
        let big_red = Rectangle::new(20, 20, 60, 60);
        let big_green = Rectangle::new(120, 20, 50, 50);
        let mut pipeline = FramePipeline::new(
            Box::new(FixedLocator(vec![small, big_green, big_red])),
            Box::new(RednessClassifier),
            labels(),
            Overlay::new(None),
            2,
        );

        let mut surface = split_frame();
        let detections = pipeline.process(&mut surface).unwrap();

        assert_eq!(detections.len(), 2);
        assert_eq!(detections[0].rect, big_red);
        assert_eq!(detections[0].result.label, "angry");
        assert_eq!(detections[1].rect, big_green);
        assert_eq!(detections[1].result.label, "neutral");
        // The surface was annotated.
        assert_ne!(*surface.get_pixel(50, 20), Rgb([255, 0, 0]));
    }

    #[test]
    fn test_no_faces_leaves_surface_untouched() {
        let mut pipeline = FramePipeline::new(
            Box::new(FixedLocator(Vec::new())),
            Box::new(RednessClassifier),
            labels(),
            Overlay::new(None),
            2,
        );
        let mut surface = split_frame();
        let before = surface.clone();
        assert!(pipeline.process(&mut surface).unwrap().is_empty());
        assert_eq!(surface, before);
    }

    #[test]
    fn test_classifier_error_propagates_without_drawing() {
        let mut pipeline = FramePipeline::new(
            Box::new(FixedLocator(vec![Rectangle::new(20, 20, 60, 60)])),
            Box::new(FailingClassifier),
            labels(),
            Overlay::new(None),
            2,
        );
        let mut surface = split_frame();
        let before = surface.clone();
        let err = pipeline.process(&mut surface).unwrap_err();
        assert!(matches!(err, PipelineError::Classifier(_)));
        assert_eq!(surface, before);
    }

    #[test]
    fn test_degenerate_box_beside_valid_face_is_ignored() {
        let face = Rectangle::new(10, 10, 40, 40);
        let mut pipeline = FramePipeline::new(
            Box::new(FixedLocator(vec![face, Rectangle::new(5, 5, 0, 30)])),
            Box::new(RednessClassifier),
            labels(),
            Overlay::new(None),
            2,
        );
        let detections = pipeline.process(&mut split_frame()).unwrap();
        assert_eq!(detections.len(), 1);
        assert_eq!(detections[0].rect, face);
        assert_eq!(detections[0].result.label, "angry");
    }

    #[test]
    fn test_out_of_frame_box_does_not_displace_valid_faces() {
        let red = Rectangle::new(20, 20, 50, 50);
        let green = Rectangle::new(120, 20, 40, 40);
        // Largest by area, but reaches past the right edge.
        let overhang = Rectangle::new(150, 10, 90, 90);
        let mut pipeline = FramePipeline::new(
            Box::new(FixedLocator(vec![overhang, green, red])),
            Box::new(RednessClassifier),
            labels(),
            Overlay::new(None),
            2,
        );
        let detections = pipeline.process(&mut split_frame()).unwrap();
        let rects: Vec<Rectangle> = detections.iter().map(|d| d.rect).collect();
        assert_eq!(rects, vec![red, green]);
    }
}
