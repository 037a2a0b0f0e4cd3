//! Python bindings for the LTspice raw file decoder
//!
//! This crate provides PyO3 bindings to expose ltspice-core to Python.

use ltspice_core::{self, Dataset, Metadata, RawError, Variable, VectorData};
use numpy::ndarray::Array1;
use numpy::IntoPyArray;
use pyo3::exceptions::{PyIOError, PyValueError};
use pyo3::prelude::*;
use pyo3::types::{PyDict, PyList};
use tracing::warn;
use tracing_subscriber::EnvFilter;

// ============================================================================
// Python Classes
// ============================================================================

/// Python wrapper for Variable
#[pyclass(name = "Variable")]
#[derive(Clone)]
pub struct PyVariable {
    #[pyo3(get)]
    pub index: usize,
    #[pyo3(get)]
    pub name: String,
    #[pyo3(get)]
    pub kind: String,
    /// Bytes per sample in the binary section
    #[pyo3(get)]
    pub width: usize,
}

#[pymethods]
impl PyVariable {
    fn __repr__(&self) -> String {
        format!(
            "Variable(name='{}', kind='{}', width={})",
            self.name, self.kind, self.width
        )
    }
}

impl From<&Variable> for PyVariable {
    fn from(v: &Variable) -> Self {
        PyVariable {
            index: v.index,
            name: v.name.clone(),
            kind: v.kind.clone(),
            width: v.width.bytes(),
        }
    }
}

/// Python wrapper for a decoded raw file
#[pyclass(name = "RawFile")]
pub struct PyRawFile {
    #[pyo3(get)]
    pub title: String,
    #[pyo3(get)]
    pub date: String,
    #[pyo3(get)]
    pub plotname: String,
    #[pyo3(get)]
    pub command: String,
    #[pyo3(get)]
    pub flags: String,
    #[pyo3(get)]
    pub offset: Option<f64>,

    metadata: Metadata,
    vectors: Vec<VectorData>,
}

#[pymethods]
impl PyRawFile {
    /// Get list of variables
    #[getter]
    fn variables(&self) -> Vec<PyVariable> {
        self.metadata.variables.iter().map(PyVariable::from).collect()
    }

    /// Header lines the decoder did not interpret, as (key, value) pairs
    #[getter]
    fn extra_fields(&self) -> Vec<(String, String)> {
        self.metadata
            .fields
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    /// Get signal data by name as a numpy array
    fn get(&self, py: Python<'_>, name: &str) -> Option<Py<PyAny>> {
        let var = self.metadata.variable(name)?;
        let vector = self.vectors.get(var.index)?;
        Some(vector_to_numpy(py, vector))
    }

    /// Get number of data points
    fn __len__(&self) -> usize {
        self.metadata.num_points
    }

    fn __contains__(&self, name: &str) -> bool {
        self.metadata.variable(name).is_some()
    }

    /// Get all variable names, in declared order
    fn keys(&self) -> Vec<String> {
        self.metadata.variable_names()
    }

    fn is_complex(&self) -> bool {
        self.metadata.is_complex()
    }

    fn __repr__(&self) -> String {
        format!(
            "RawFile(title='{}', plotname='{}', vars={}, points={})",
            self.title,
            self.plotname,
            self.metadata.variables.len(),
            self.__len__()
        )
    }
}

impl From<Dataset> for PyRawFile {
    fn from(d: Dataset) -> Self {
        let meta = d.metadata;
        PyRawFile {
            title: meta.title.clone(),
            date: meta.date.clone(),
            plotname: meta.plotname.clone(),
            command: meta.command.clone(),
            flags: meta.flags.raw().to_string(),
            offset: meta.offset,
            metadata: meta,
            vectors: d.vectors,
        }
    }
}

// ============================================================================
// Helper Functions
// ============================================================================

fn vector_to_numpy(py: Python, vector: &VectorData) -> Py<PyAny> {
    match vector {
        VectorData::Real(v) => Array1::from_vec(v.clone())
            .into_pyarray(py)
            .into_any()
            .unbind(),
        VectorData::Complex(v) => Array1::from_vec(v.clone())
            .into_pyarray(py)
            .into_any()
            .unbind(),
    }
}

fn to_py_err(e: RawError) -> PyErr {
    match e {
        RawError::Open { .. } | RawError::Read(_) => PyIOError::new_err(e.to_string()),
        other => PyValueError::new_err(other.to_string()),
    }
}

// ============================================================================
// Python Functions
// ============================================================================

/// Read an LTspice raw file
///
/// Args:
///     filename: Path to the .raw file
///
/// Returns:
///     RawFile object
///
/// Raises:
///     IOError if the file cannot be opened, ValueError if it is malformed
#[pyfunction]
pub fn read(py: Python, filename: &str) -> PyResult<PyRawFile> {
    let owned = filename.to_string();
    py.allow_threads(move || ltspice_core::read(&owned))
        .map(PyRawFile::from)
        .map_err(to_py_err)
}

/// Decode an LTspice raw file already held in memory
#[pyfunction]
pub fn read_bytes(data: &[u8]) -> PyResult<PyRawFile> {
    ltspice_core::read_bytes(data)
        .map(PyRawFile::from)
        .map_err(to_py_err)
}

/// Stream a large raw file in chunks
///
/// Returns a list of dicts with `chunk_index`, `point_range` and `data`.
/// A bad chunk raises like `read` does; no partial list is returned.
#[pyfunction]
#[pyo3(signature = (filename, chunk_size=10000, signals=None))]
pub fn stream(
    py: Python,
    filename: &str,
    chunk_size: usize,
    signals: Option<Vec<String>>,
) -> PyResult<Py<PyList>> {
    use ltspice_core::{read_stream_chunked, read_stream_signals};

    let reader = match signals {
        Some(ref sigs) => {
            let sig_refs: Vec<&str> = sigs.iter().map(|s| s.as_str()).collect();
            read_stream_signals(filename, &sig_refs, chunk_size)
        }
        None => read_stream_chunked(filename, chunk_size),
    }
    .map_err(to_py_err)?;

    let chunks = reader
        .collect::<ltspice_core::Result<Vec<_>>>()
        .map_err(|e| {
            warn!(filename, error = %e, "Stream chunk error");
            to_py_err(e)
        })?;

    let chunks_list = PyList::empty(py);
    for chunk in chunks {
        let chunk_dict = PyDict::new(py);
        chunk_dict.set_item("chunk_index", chunk.chunk_index)?;
        chunk_dict.set_item("point_range", chunk.point_range)?;

        let data_dict = PyDict::new(py);
        for (name, vector) in chunk.data {
            data_dict.set_item(name, vector_to_numpy(py, &vector))?;
        }
        chunk_dict.set_item("data", data_dict)?;

        chunks_list.append(chunk_dict)?;
    }

    Ok(chunks_list.unbind())
}

/// Route decoder logs to stderr
///
/// Args:
///     filter: RUST_LOG style directive, e.g. "ltspice_core=debug"
#[pyfunction]
#[pyo3(signature = (filter="info"))]
pub fn init_logging(filter: &str) -> PyResult<()> {
    let env_filter =
        EnvFilter::try_new(filter).map_err(|e| PyValueError::new_err(e.to_string()))?;
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| PyValueError::new_err(e.to_string()))
}

// ============================================================================
// Module Definition
// ============================================================================

#[pymodule]
pub fn ltspice(m: &Bound<'_, PyModule>) -> PyResult<()> {
    // Functions
    m.add_function(wrap_pyfunction!(read, m)?)?;
    m.add_function(wrap_pyfunction!(read_bytes, m)?)?;
    m.add_function(wrap_pyfunction!(stream, m)?)?;
    m.add_function(wrap_pyfunction!(init_logging, m)?)?;

    // Classes
    m.add_class::<PyRawFile>()?;
    m.add_class::<PyVariable>()?;

    Ok(())
}
