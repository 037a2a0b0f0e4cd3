//! C Foreign Function Interface (FFI) for the LTspice raw file decoder
//!
//! This module provides a C-compatible API for using the decoder from C,
//! C++, and other languages that support C FFI.
//!
//! Errors are reported as null pointers or negative return codes and logged
//! through `tracing`; call `ltspice_init_logging` once to see them.

use ltspice_core::{read, read_stream_chunked, DataChunk, Dataset, RawStreamReader, VectorData};
use std::ffi::{c_char, c_double, c_int, CStr, CString};
use std::fs::File;
use std::io::BufReader;
use std::ptr;
use tracing::warn;
use tracing_subscriber::EnvFilter;

// ============================================================================
// Logging
// ============================================================================

/// Install a stderr log subscriber.
///
/// `filter` uses `RUST_LOG` syntax (e.g. "ltspice_core=debug"); null falls
/// back to the `RUST_LOG` environment variable. Returns 0 on success, -1 if
/// a subscriber is already installed or the filter is invalid.
#[no_mangle]
pub unsafe extern "C" fn ltspice_init_logging(filter: *const c_char) -> c_int {
    let env_filter = if filter.is_null() {
        EnvFilter::from_default_env()
    } else {
        let directives = match CStr::from_ptr(filter).to_str() {
            Ok(s) => s,
            Err(_) => return -1,
        };
        match EnvFilter::try_new(directives) {
            Ok(f) => f,
            Err(_) => return -1,
        }
    };

    match tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .try_init()
    {
        Ok(()) => 0,
        Err(_) => -1,
    }
}

// ============================================================================
// Opaque Types for C
// ============================================================================

/// Opaque handle to a decoded raw file
#[repr(C)]
pub struct CRawFile {
    inner: Box<Dataset>,
    cached_title: CString,
    cached_date: CString,
    cached_plotname: CString,
    cached_flags: CString,
    cached_var_names: Vec<CString>,
    cached_var_kinds: Vec<CString>,
}

unsafe fn path_arg<'a>(path: *const c_char) -> Option<&'a str> {
    if path.is_null() {
        return None;
    }
    CStr::from_ptr(path).to_str().ok()
}

fn cstring(s: &str) -> CString {
    CString::new(s).unwrap_or_default()
}

// ============================================================================
// Result Creation and Destruction
// ============================================================================

/// Read a raw file and return a result handle, or null on failure.
#[no_mangle]
pub unsafe extern "C" fn ltspice_read(path: *const c_char) -> *mut CRawFile {
    let Some(path) = path_arg(path) else {
        return ptr::null_mut();
    };

    match read(path) {
        Ok(dataset) => {
            let meta = &dataset.metadata;
            let cached_title = cstring(&meta.title);
            let cached_date = cstring(&meta.date);
            let cached_plotname = cstring(&meta.plotname);
            let cached_flags = cstring(meta.flags.raw());
            let cached_var_names = meta.variables.iter().map(|v| cstring(&v.name)).collect();
            let cached_var_kinds = meta.variables.iter().map(|v| cstring(&v.kind)).collect();

            Box::into_raw(Box::new(CRawFile {
                inner: Box::new(dataset),
                cached_title,
                cached_date,
                cached_plotname,
                cached_flags,
                cached_var_names,
                cached_var_kinds,
            }))
        }
        Err(e) => {
            warn!(path, error = %e, "ltspice_read failed");
            ptr::null_mut()
        }
    }
}

/// Free a result handle.
#[no_mangle]
pub unsafe extern "C" fn ltspice_free(result: *mut CRawFile) {
    if !result.is_null() {
        drop(Box::from_raw(result));
    }
}

// ============================================================================
// Metadata Accessors
// ============================================================================

#[no_mangle]
pub unsafe extern "C" fn ltspice_get_title(result: *const CRawFile) -> *const c_char {
    if result.is_null() {
        return ptr::null();
    }
    (*result).cached_title.as_ptr()
}

#[no_mangle]
pub unsafe extern "C" fn ltspice_get_date(result: *const CRawFile) -> *const c_char {
    if result.is_null() {
        return ptr::null();
    }
    (*result).cached_date.as_ptr()
}

#[no_mangle]
pub unsafe extern "C" fn ltspice_get_plotname(result: *const CRawFile) -> *const c_char {
    if result.is_null() {
        return ptr::null();
    }
    (*result).cached_plotname.as_ptr()
}

#[no_mangle]
pub unsafe extern "C" fn ltspice_get_flags(result: *const CRawFile) -> *const c_char {
    if result.is_null() {
        return ptr::null();
    }
    (*result).cached_flags.as_ptr()
}

#[no_mangle]
pub unsafe extern "C" fn ltspice_get_var_count(result: *const CRawFile) -> c_int {
    if result.is_null() {
        return 0;
    }
    (*result).inner.vectors.len() as c_int
}

#[no_mangle]
pub unsafe extern "C" fn ltspice_get_point_count(result: *const CRawFile) -> c_int {
    if result.is_null() {
        return 0;
    }
    (*result).inner.len() as c_int
}

// ============================================================================
// Variable Accessors
// ============================================================================

#[no_mangle]
pub unsafe extern "C" fn ltspice_get_var_name(
    result: *const CRawFile,
    index: c_int,
) -> *const c_char {
    if result.is_null() || index < 0 {
        return ptr::null();
    }
    match (&(*result).cached_var_names).get(index as usize) {
        Some(name) => name.as_ptr(),
        None => ptr::null(),
    }
}

/// Type token of a variable (`time`, `voltage`, ...)
#[no_mangle]
pub unsafe extern "C" fn ltspice_get_var_kind(
    result: *const CRawFile,
    index: c_int,
) -> *const c_char {
    if result.is_null() || index < 0 {
        return ptr::null();
    }
    match (&(*result).cached_var_kinds).get(index as usize) {
        Some(kind) => kind.as_ptr(),
        None => ptr::null(),
    }
}

/// Field width in bytes (4, 8 or 16), -1 on bad arguments
#[no_mangle]
pub unsafe extern "C" fn ltspice_get_var_width(result: *const CRawFile, index: c_int) -> c_int {
    if result.is_null() || index < 0 {
        return -1;
    }
    match (*result).inner.variables().get(index as usize) {
        Some(var) => var.width.bytes() as c_int,
        None => -1,
    }
}

#[no_mangle]
pub unsafe extern "C" fn ltspice_is_complex(result: *const CRawFile, index: c_int) -> c_int {
    if result.is_null() || index < 0 {
        return -1;
    }
    match (&(*result).inner.vectors).get(index as usize) {
        Some(v) if v.is_complex() => 1,
        Some(_) => 0,
        None => -1,
    }
}

// ============================================================================
// Data Accessors
// ============================================================================

/// Copy real data of a variable into `out_buffer`.
///
/// Returns the number of values written, or -1 for complex variables and
/// bad arguments.
#[no_mangle]
pub unsafe extern "C" fn ltspice_get_real_data(
    result: *const CRawFile,
    index: c_int,
    out_buffer: *mut c_double,
    max_count: c_int,
) -> c_int {
    if result.is_null() || out_buffer.is_null() || index < 0 || max_count <= 0 {
        return -1;
    }

    match (&(*result).inner.vectors).get(index as usize) {
        Some(VectorData::Real(vec)) => {
            let count = std::cmp::min(vec.len(), max_count as usize);
            ptr::copy_nonoverlapping(vec.as_ptr(), out_buffer, count);
            count as c_int
        }
        _ => -1,
    }
}

/// Copy complex data of a variable into two parallel buffers.
#[no_mangle]
pub unsafe extern "C" fn ltspice_get_complex_data(
    result: *const CRawFile,
    index: c_int,
    out_real: *mut c_double,
    out_imag: *mut c_double,
    max_count: c_int,
) -> c_int {
    if result.is_null() || out_real.is_null() || out_imag.is_null() {
        return -1;
    }
    if index < 0 || max_count <= 0 {
        return -1;
    }

    match (&(*result).inner.vectors).get(index as usize) {
        Some(VectorData::Complex(vec)) => {
            let count = std::cmp::min(vec.len(), max_count as usize);
            for (i, c) in vec.iter().take(count).enumerate() {
                *out_real.add(i) = c.re;
                *out_imag.add(i) = c.im;
            }
            count as c_int
        }
        _ => -1,
    }
}

// ============================================================================
// Streaming API
// ============================================================================

#[repr(C)]
pub struct CRawStream {
    reader: RawStreamReader<BufReader<File>>,
    current_chunk: Option<DataChunk>,
}

#[no_mangle]
pub unsafe extern "C" fn ltspice_stream_open(
    path: *const c_char,
    chunk_size: c_int,
) -> *mut CRawStream {
    if chunk_size <= 0 {
        return ptr::null_mut();
    }
    let Some(path) = path_arg(path) else {
        return ptr::null_mut();
    };

    match read_stream_chunked(path, chunk_size as usize) {
        Ok(reader) => Box::into_raw(Box::new(CRawStream {
            reader,
            current_chunk: None,
        })),
        Err(e) => {
            warn!(path, error = %e, "ltspice_stream_open failed");
            ptr::null_mut()
        }
    }
}

#[no_mangle]
pub unsafe extern "C" fn ltspice_stream_close(stream: *mut CRawStream) {
    if !stream.is_null() {
        drop(Box::from_raw(stream));
    }
}

/// Advance to the next chunk: 1 = chunk available, 0 = done, -1 = error
#[no_mangle]
pub unsafe extern "C" fn ltspice_stream_next(stream: *mut CRawStream) -> c_int {
    if stream.is_null() {
        return -1;
    }
    let stream = &mut *stream;

    match stream.reader.next() {
        Some(Ok(chunk)) => {
            stream.current_chunk = Some(chunk);
            1
        }
        Some(Err(e)) => {
            warn!(error = %e, "ltspice_stream_next failed");
            stream.current_chunk = None;
            -1
        }
        None => {
            stream.current_chunk = None;
            0
        }
    }
}

#[no_mangle]
pub unsafe extern "C" fn ltspice_stream_get_chunk_size(stream: *const CRawStream) -> c_int {
    if stream.is_null() {
        return 0;
    }
    match &(*stream).current_chunk {
        Some(chunk) => chunk.len() as c_int,
        None => 0,
    }
}

/// First point index of the current chunk, -1 when there is none
#[no_mangle]
pub unsafe extern "C" fn ltspice_stream_get_chunk_start(stream: *const CRawStream) -> c_int {
    if stream.is_null() {
        return -1;
    }
    match &(*stream).current_chunk {
        Some(chunk) => chunk.point_range.0 as c_int,
        None => -1,
    }
}

/// Copy one signal of the current chunk; complex signals are copied as
/// magnitudes.
#[no_mangle]
pub unsafe extern "C" fn ltspice_stream_get_signal_data(
    stream: *const CRawStream,
    signal_name: *const c_char,
    out_buffer: *mut c_double,
    max_count: c_int,
) -> c_int {
    if stream.is_null() || signal_name.is_null() || out_buffer.is_null() || max_count <= 0 {
        return -1;
    }

    let name = match CStr::from_ptr(signal_name).to_str() {
        Ok(s) => s,
        Err(_) => return -1,
    };

    let chunk = match &(*stream).current_chunk {
        Some(c) => c,
        None => return -1,
    };

    match chunk.data.get(name) {
        Some(VectorData::Real(vec)) => {
            let count = std::cmp::min(vec.len(), max_count as usize);
            ptr::copy_nonoverlapping(vec.as_ptr(), out_buffer, count);
            count as c_int
        }
        Some(vector @ VectorData::Complex(_)) => {
            let magnitude = vector.magnitude();
            let count = std::cmp::min(magnitude.len(), max_count as usize);
            ptr::copy_nonoverlapping(magnitude.as_ptr(), out_buffer, count);
            count as c_int
        }
        None => -1,
    }
}
