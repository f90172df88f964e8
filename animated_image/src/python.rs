//! Python bindings

use pyo3::exceptions::{PyIndexError, PyValueError};
use pyo3::prelude::*;
use pyo3::types::PyBytes;

use crate::{AnimatedImage, AnimatedSequence, MediaError, StillImage};

fn to_py_err(err: MediaError) -> PyErr {
    match err {
        MediaError::IndexOutOfRange { .. } => PyIndexError::new_err(err.to_string()),
        other => PyValueError::new_err(other.to_string()),
    }
}

/// Animated image container
#[pyclass(name = "AnimatedImage")]
pub struct PyAnimatedImage {
    inner: AnimatedImage,
}

#[pymethods]
impl PyAnimatedImage {
    #[new]
    #[pyo3(signature = (data, scale=1.0, decode_for_display=true, max_pixel_size=0))]
    fn new(
        data: &Bound<'_, PyBytes>,
        scale: f64,
        decode_for_display: bool,
        max_pixel_size: u32,
    ) -> PyResult<Self> {
        let inner = AnimatedImage::new(data.as_bytes(), scale, decode_for_display, max_pixel_size)
            .map_err(to_py_err)?;
        Ok(Self { inner })
    }

    #[staticmethod]
    fn from_file(path: &str) -> PyResult<Self> {
        let inner = AnimatedImage::from_file(path).map_err(to_py_err)?;
        Ok(Self { inner })
    }

    #[getter]
    fn image_type(&self) -> &'static str {
        self.inner.animated_image_type().name()
    }

    #[getter]
    fn is_animated(&self) -> bool {
        self.inner.is_animated()
    }

    #[getter]
    fn frame_count(&self) -> usize {
        self.inner.frame_count()
    }

    #[getter]
    fn loop_count(&self) -> u32 {
        self.inner.loop_count()
    }

    #[getter]
    fn scale(&self) -> f64 {
        self.inner.scale()
    }

    #[getter]
    fn pixel_size(&self) -> (u32, u32) {
        self.inner.pixel_size()
    }

    #[getter]
    fn memory_size(&self) -> usize {
        self.inner.animated_image_memory_size()
    }

    #[getter]
    fn preload_all_frames(&self) -> bool {
        self.inner.preload_all_frames()
    }

    /// Preload or release frames (releases the GIL while decoding)
    fn set_preload_all_frames(&self, py: Python<'_>, preload: bool) {
        let inner = &self.inner;
        py.allow_threads(|| inner.set_preload_all_frames(preload));
    }

    fn animated_image_data<'py>(&self, py: Python<'py>) -> Option<Bound<'py, PyBytes>> {
        self.inner
            .animated_image_data()
            .map(|data| PyBytes::new_bound(py, data))
    }

    fn frame_duration_ms(&self, index: usize) -> Option<u64> {
        self.inner.frame_duration(index).map(|d| d.as_millis() as u64)
    }

    /// RGBA bytes of a frame; negative indices are out of range
    fn frame<'py>(&self, py: Python<'py>, index: i64) -> PyResult<Bound<'py, PyBytes>> {
        let index = usize::try_from(index).map_err(|_| {
            to_py_err(MediaError::IndexOutOfRange {
                index: usize::MAX,
                frame_count: self.inner.frame_count(),
            })
        })?;
        let inner = &self.inner;
        let frame = py.allow_threads(|| inner.frame(index)).map_err(to_py_err)?;
        Ok(PyBytes::new_bound(py, frame.image().as_raw()))
    }

    fn __len__(&self) -> usize {
        self.inner.frame_count()
    }
}

#[pyfunction]
fn downsample<'py>(py: Python<'py>, data: &Bound<'py, PyBytes>, max_pixel_size: u32) -> Bound<'py, PyBytes> {
    PyBytes::new_bound(py, &crate::downsample(data.as_bytes(), max_pixel_size))
}

#[pyfunction]
fn get_downsample_factor() -> f64 {
    crate::downsample_factor()
}

#[pyfunction]
fn set_downsample_factor(factor: f64) {
    crate::set_downsample_factor(factor)
}

#[pyfunction]
fn pixel_size<'py>(data: &Bound<'py, PyBytes>) -> Option<(u32, u32)> {
    crate::pixel_size_from_bytes(data.as_bytes())
}

/// Python module
#[pymodule]
fn animated_image(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_class::<PyAnimatedImage>()?;

    m.add_function(wrap_pyfunction!(downsample, m)?)?;
    m.add_function(wrap_pyfunction!(get_downsample_factor, m)?)?;
    m.add_function(wrap_pyfunction!(set_downsample_factor, m)?)?;
    m.add_function(wrap_pyfunction!(pixel_size, m)?)?;

    // Version info
    m.add("__version__", env!("CARGO_PKG_VERSION"))?;
    m.add("__author__", "voraehita25-star")?;

    Ok(())
}
