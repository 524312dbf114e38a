//! Convolution dispatcher.
//!
//! A [`Dispatcher`] is configured once and builds once. A build runs these
//! stages in order, stopping at the first failure:
//!
//! 1. allocate the output shell
//! 2. validate the input image
//! 3. convert the mask for the selected precision
//! 4. execute the kernel
//! 5. finalize and hand the output to the caller
//!
//! There is no retry and no fallback to another precision.

use crate::core::config::{ConvolutionConfig, PrecisionMode};
use crate::core::error::{ConvError, ConvResult, DispatchState, KernelError, KernelResult};
use crate::core::types::Raster;
use crate::execution::strategy::{
    ApproximateStrategy, ConvolutionStrategy, FloatStrategy, IntegerStrategy,
};
use crate::kernels::KernelSet;
use crate::mask::description::MaskDescription;
use crate::validation::pipeline::{PreBuildValidator, ValidationPipeline};
use std::sync::Arc;
use std::time::Instant;

/// Selects and runs a convolution kernel.
pub struct Dispatcher {
    state: DispatchState,
    config: ConvolutionConfig,
    validator: Arc<dyn PreBuildValidator>,
    kernels: KernelSet,
}

impl Dispatcher {
    /// Create a dispatcher with the default kernels and validation.
    pub fn new() -> Self {
        Self::with_kernels(KernelSet::default())
    }

    /// Create a dispatcher with custom kernels.
    pub fn with_kernels(kernels: KernelSet) -> Self {
        Self {
            state: DispatchState::Unconfigured,
            config: ConvolutionConfig::default(),
            validator: Arc::new(ValidationPipeline::default()),
            kernels,
        }
    }

    /// Replace the pre-build validator.
    pub fn with_validator(mut self, validator: impl PreBuildValidator + 'static) -> Self {
        self.validator = Arc::new(validator);
        self
    }

    /// Current lifecycle state.
    pub fn state(&self) -> DispatchState {
        self.state
    }

    /// Active configuration.
    pub fn config(&self) -> &ConvolutionConfig {
        &self.config
    }

    /// Set precision and approximation parameters.
    ///
    /// Out-of-range parameters are rejected without changing the state. May
    /// be called repeatedly before [`build`](Self::build); the last call wins.
    pub fn configure(&mut self, precision: PrecisionMode, layers: u32, cluster: u32) -> ConvResult<()> {
        self.ensure_open("configure")?;
        let config = ConvolutionConfig::new(precision, layers, cluster)?;
        self.apply(config);
        Ok(())
    }

    /// Set an already validated configuration.
    pub fn configure_with(&mut self, config: ConvolutionConfig) -> ConvResult<()> {
        self.ensure_open("configure")?;
        self.apply(config);
        Ok(())
    }

    /// Convolve `input` with `mask`.
    ///
    /// On success the dispatcher is `Built` and the output is returned; on
    /// failure it is `Failed` and no output exists. Either way the dispatcher
    /// cannot be reused.
    pub fn build(&mut self, input: Option<&Raster>, mask: &MaskDescription) -> ConvResult<Raster> {
        self.ensure_open("build")?;

        let start = Instant::now();
        let precision = self.config.precision;
        match self.run_stages(input, mask) {
            Ok(output) => {
                self.state = DispatchState::Built;
                log::info!(
                    "{} convolution of {} with {}x{} mask took {:?}",
                    precision,
                    output.layout(),
                    mask.width,
                    mask.height,
                    start.elapsed()
                );
                Ok(output)
            }
            Err(error) => {
                self.state = DispatchState::Failed;
                log::warn!("{} convolution failed: {}", precision, error);
                Err(error)
            }
        }
    }

    fn ensure_open(&self, operation: &'static str) -> ConvResult<()> {
        match self.state {
            DispatchState::Unconfigured | DispatchState::Configured => Ok(()),
            state => Err(ConvError::InvalidState { state, operation }),
        }
    }

    fn apply(&mut self, config: ConvolutionConfig) {
        log::debug!(
            "configured precision={} layers={} cluster={}",
            config.precision,
            config.approximation.layers(),
            config.approximation.cluster()
        );
        self.config = config;
        self.state = DispatchState::Configured;
    }

    fn run_stages(&self, input: Option<&Raster>, mask: &MaskDescription) -> ConvResult<Raster> {
        log::debug!("allocating output shell");
        let mut shell = OutputShell::default();

        log::debug!("validating input");
        let input = self.validator.validate(input)?;
        shell.resolve(input);

        let kernels = &self.kernels;
        match self.config.precision {
            PrecisionMode::Integer => {
                run_strategy(&IntegerStrategy::new(kernels.integer.as_ref()), input, mask, shell)
            }
            PrecisionMode::Float => {
                run_strategy(&FloatStrategy::new(kernels.float.as_ref()), input, mask, shell)
            }
            PrecisionMode::Approximate => run_strategy(
                &ApproximateStrategy::new(kernels.approximate.as_ref(), self.config.approximation),
                input,
                mask,
                shell,
            ),
        }
    }
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("state", &self.state)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

fn run_strategy<S: ConvolutionStrategy>(
    strategy: &S,
    input: &Raster,
    description: &MaskDescription,
    shell: OutputShell<'_>,
) -> ConvResult<Raster> {
    let precision = strategy.precision();

    log::debug!("converting mask for {} precision", precision);
    let mask = strategy.convert(description)?;
    description.check_bands(input.bands() as usize)?;

    log::debug!("executing {} kernel", precision);
    let wrap = |source| ConvError::KernelExecution { precision, source };
    let output = strategy.execute(input, &mask).map_err(wrap)?;

    log::debug!("finalizing output");
    shell.fill(output).map_err(wrap)
}

/// Output placeholder whose layout is fixed once the input is validated.
#[derive(Default)]
struct OutputShell<'a> {
    template: Option<&'a Raster>,
}

impl<'a> OutputShell<'a> {
    fn resolve(&mut self, input: &'a Raster) {
        self.template = Some(input);
    }

    /// Accept kernel output only if its layout matches the input.
    fn fill(self, output: Raster) -> KernelResult<Raster> {
        let template = self
            .template
            .ok_or_else(|| KernelError::Failed("output geometry was never resolved".to_string()))?;
        if !template.same_layout(&output) {
            return Err(KernelError::GeometryMismatch {
                expected: template.layout(),
                got: output.layout(),
            });
        }
        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::ApproximationParams;
    use crate::core::error::{MaskError, ParameterError, PipelineError, Stage};
    use crate::core::types::{PixelBuffer, PixelFormat};
    use crate::kernels::{ApproximateKernel, FloatKernel, IntegerKernel};
    use crate::mask::types::{FloatMask, IntMask};

    struct FailingKernel;

    impl IntegerKernel for FailingKernel {
        fn run(&self, _: &Raster, _: &IntMask) -> KernelResult<Raster> {
            Err(KernelError::Failed("integer kernel exploded".to_string()))
        }
    }

    impl FloatKernel for FailingKernel {
        fn run(&self, _: &Raster, _: &FloatMask) -> KernelResult<Raster> {
            Err(KernelError::Failed("float kernel exploded".to_string()))
        }
    }

    impl ApproximateKernel for FailingKernel {
        fn run(&self, _: &Raster, _: &FloatMask, _: &ApproximationParams) -> KernelResult<Raster> {
            Err(KernelError::Failed("approximate kernel exploded".to_string()))
        }
    }

    /// Returns a 1x1 image whatever the input.
    struct ShrinkingKernel;

    impl FloatKernel for ShrinkingKernel {
        fn run(&self, input: &Raster, _: &FloatMask) -> KernelResult<Raster> {
            Ok(Raster::filled(1, 1, input.bands(), input.format(), 0.0))
        }
    }

    fn failing_kernels() -> KernelSet {
        KernelSet::default()
            .with_integer(FailingKernel)
            .with_float(FailingKernel)
            .with_approximate(FailingKernel)
    }

    fn identity() -> MaskDescription {
        MaskDescription::new(1, 1, vec![1.0])
            .with_scale(1.0)
            .with_offset(0.0)
    }

    #[test]
    fn test_identity_integer_scenario() {
        let input = Raster::from_u8(2, 2, 1, vec![10, 20, 30, 40]);
        let mut dispatcher = Dispatcher::new();
        dispatcher.configure(PrecisionMode::Integer, 5, 1).unwrap();

        let output = dispatcher.build(Some(&input), &identity()).unwrap();
        assert_eq!(output.pixels(), &PixelBuffer::U8(vec![10, 20, 30, 40]));
        assert_eq!(dispatcher.state(), DispatchState::Built);
    }

    #[test]
    fn test_identity_float_is_exact() {
        let input = Raster::from_f32(3, 2, 1, vec![0.1, 0.2, 0.3, 1.0e-7, 123.456, -9.0]);
        let mut dispatcher = Dispatcher::new();
        dispatcher.configure(PrecisionMode::Float, 5, 1).unwrap();

        let output = dispatcher.build(Some(&input), &identity()).unwrap();
        assert_eq!(output, input);
    }

    #[test]
    fn test_box_blur_float_scenario() {
        let input = Raster::filled(7, 5, 1, PixelFormat::F32, 50.0);
        let mask = MaskDescription::new(3, 3, vec![1.0; 9]);
        let mut dispatcher = Dispatcher::new();
        dispatcher.configure(PrecisionMode::Float, 5, 1).unwrap();

        let output = dispatcher.build(Some(&input), &mask).unwrap();
        match output.pixels() {
            PixelBuffer::F32(samples) => {
                assert!(samples.iter().all(|s| (s - 50.0).abs() < 1e-4));
            }
            other => panic!("unexpected buffer {:?}", other.format()),
        }
    }

    #[test]
    fn test_layout_preserved_for_every_precision() {
        let mask = MaskDescription::new(3, 3, vec![1.0, 2.0, 1.0, 2.0, 4.0, 2.0, 1.0, 2.0, 1.0]);
        let inputs = [
            Raster::filled(5, 3, 1, PixelFormat::U8, 10.0),
            Raster::filled(4, 6, 3, PixelFormat::U16, 1000.0),
            Raster::filled(2, 2, 4, PixelFormat::F32, 0.5),
        ];
        for precision in PrecisionMode::ALL {
            for input in &inputs {
                let mut dispatcher = Dispatcher::new();
                dispatcher.configure(precision, 5, 1).unwrap();
                let output = dispatcher.build(Some(input), &mask).unwrap();
                assert!(
                    output.same_layout(input),
                    "{} changed {} into {}",
                    precision,
                    input.layout(),
                    output.layout()
                );
            }
        }
    }

    #[test]
    fn test_default_configuration_builds() {
        let input = Raster::from_u8(2, 1, 1, vec![3, 5]);
        let mut dispatcher = Dispatcher::new();
        assert_eq!(dispatcher.state(), DispatchState::Unconfigured);
        assert_eq!(dispatcher.config().precision, PrecisionMode::Integer);

        assert!(dispatcher.build(Some(&input), &identity()).is_ok());
        assert_eq!(dispatcher.state(), DispatchState::Built);
    }

    #[test]
    fn test_configure_bounds() {
        let mut dispatcher = Dispatcher::new();
        for (layers, cluster) in [(0, 1), (1001, 1), (5, 0), (5, 101)] {
            let err = dispatcher.configure(PrecisionMode::Approximate, layers, cluster).unwrap_err();
            assert!(matches!(err, ConvError::InvalidParameter(_)));
            assert_eq!(dispatcher.state(), DispatchState::Unconfigured);
        }

        dispatcher.configure(PrecisionMode::Approximate, 1, 1).unwrap();
        dispatcher.configure(PrecisionMode::Approximate, 1000, 100).unwrap();
        assert_eq!(dispatcher.state(), DispatchState::Configured);
        assert_eq!(dispatcher.config().approximation.layers(), 1000);
        assert_eq!(dispatcher.config().approximation.cluster(), 100);
    }

    #[test]
    fn test_last_configuration_wins() {
        let input = Raster::from_u8(1, 1, 1, vec![9]);
        let mut dispatcher = Dispatcher::with_kernels(
            KernelSet::default().with_float(FailingKernel),
        );
        dispatcher.configure(PrecisionMode::Float, 5, 1).unwrap();
        dispatcher.configure(PrecisionMode::Integer, 7, 2).unwrap();

        assert!(dispatcher.build(Some(&input), &identity()).is_ok());
    }

    #[test]
    fn test_kernel_failure_on_every_path() {
        let input = Raster::from_u8(2, 2, 1, vec![10, 20, 30, 40]);
        let pristine = input.clone();

        for precision in PrecisionMode::ALL {
            let mut dispatcher = Dispatcher::with_kernels(failing_kernels());
            dispatcher.configure(precision, 5, 1).unwrap();

            let err = dispatcher.build(Some(&input), &identity()).unwrap_err();
            assert_eq!(err.stage(), Stage::KernelExecution);
            assert_eq!(err.precision(), Some(precision));
            assert_eq!(dispatcher.state(), DispatchState::Failed);
            assert_eq!(input, pristine);
        }
    }

    #[test]
    fn test_no_fallback_after_failure() {
        let input = Raster::from_u8(1, 1, 1, vec![1]);
        let mut dispatcher = Dispatcher::with_kernels(failing_kernels());
        dispatcher.configure(PrecisionMode::Approximate, 5, 1).unwrap();
        assert!(dispatcher.build(Some(&input), &identity()).is_err());

        let err = dispatcher.build(Some(&input), &identity()).unwrap_err();
        assert!(matches!(
            err,
            ConvError::InvalidState {
                state: DispatchState::Failed,
                ..
            }
        ));
        assert!(dispatcher.configure(PrecisionMode::Float, 5, 1).is_err());
    }

    #[test]
    fn test_built_is_terminal() {
        let input = Raster::from_u8(1, 1, 1, vec![1]);
        let mut dispatcher = Dispatcher::new();
        dispatcher.build(Some(&input), &identity()).unwrap();

        assert!(matches!(
            dispatcher.build(Some(&input), &identity()),
            Err(ConvError::InvalidState {
                state: DispatchState::Built,
                operation: "build"
            })
        ));
        assert!(dispatcher.configure(PrecisionMode::Float, 5, 1).is_err());
        assert_eq!(dispatcher.state(), DispatchState::Built);
    }

    #[test]
    fn test_missing_input_is_pipeline_error() {
        let mut dispatcher = Dispatcher::new();
        let err = dispatcher.build(None, &identity()).unwrap_err();
        assert!(matches!(err, ConvError::Pipeline(PipelineError::MissingInput)));
        assert_eq!(dispatcher.state(), DispatchState::Failed);
    }

    #[test]
    fn test_malformed_input_is_pipeline_error() {
        let input = Raster::from_u8(3, 3, 1, vec![0; 4]);
        let mut dispatcher = Dispatcher::new();
        let err = dispatcher.build(Some(&input), &identity()).unwrap_err();
        assert_eq!(err.stage(), Stage::PipelineValidation);
    }

    #[test]
    fn test_mask_errors_stop_before_kernel() {
        let input = Raster::from_u8(2, 2, 1, vec![0; 4]);
        for precision in PrecisionMode::ALL {
            let mut dispatcher = Dispatcher::with_kernels(failing_kernels());
            dispatcher.configure(precision, 5, 1).unwrap();
            let bad = MaskDescription::new(3, 3, vec![1.0; 8]);
            let err = dispatcher.build(Some(&input), &bad).unwrap_err();
            assert!(matches!(
                err,
                ConvError::InvalidMask(MaskError::LengthMismatch { expected: 9, got: 8 })
            ));
            assert_eq!(dispatcher.state(), DispatchState::Failed);
        }
    }

    #[test]
    fn test_band_mismatch_is_mask_error() {
        let input = Raster::from_u8(1, 1, 3, vec![1, 2, 3]);
        let mask = MaskDescription::new(1, 1, vec![1.0, 1.0]).with_bands(2);
        let mut dispatcher = Dispatcher::new();
        let err = dispatcher.build(Some(&input), &mask).unwrap_err();
        assert!(matches!(
            err,
            ConvError::InvalidMask(MaskError::BandMismatch { mask: 2, image: 3 })
        ));
    }

    #[test]
    fn test_wrong_output_geometry_is_kernel_error() {
        let input = Raster::from_u8(3, 3, 1, vec![0; 9]);
        let mut dispatcher =
            Dispatcher::with_kernels(KernelSet::default().with_float(ShrinkingKernel));
        dispatcher.configure(PrecisionMode::Float, 5, 1).unwrap();

        let err = dispatcher.build(Some(&input), &identity()).unwrap_err();
        match err {
            ConvError::KernelExecution {
                precision: PrecisionMode::Float,
                source: KernelError::GeometryMismatch { expected, got },
            } => {
                assert_eq!(expected, "3x3x1 u8");
                assert_eq!(got, "1x1x1 u8");
            }
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn test_custom_validator() {
        struct RejectAll;

        impl PreBuildValidator for RejectAll {
            fn validate<'a>(&self, _: Option<&'a Raster>) -> Result<&'a Raster, PipelineError> {
                Err(PipelineError::UnsupportedLayout("rejected".to_string()))
            }
        }

        let input = Raster::from_u8(1, 1, 1, vec![1]);
        let mut dispatcher = Dispatcher::new().with_validator(RejectAll);
        assert!(matches!(
            dispatcher.build(Some(&input), &identity()),
            Err(ConvError::Pipeline(PipelineError::UnsupportedLayout(_)))
        ));
    }

    #[test]
    fn test_invalid_parameter_error_kind() {
        let mut dispatcher = Dispatcher::new();
        assert!(matches!(
            dispatcher.configure(PrecisionMode::Integer, 0, 1),
            Err(ConvError::InvalidParameter(ParameterError::LayersOutOfRange { value: 0, .. }))
        ));
    }

    #[test]
    fn test_dispatcher_is_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Dispatcher>();
    }
}
