/*
 * Copyright 2019 The Regents of the University of California
 *
 * Licensed under the Apache License, Version 2.0 (the "License");
 * you may not use this file except in compliance with the License.
 * You may obtain a copy of the License at
 *
 *     http://www.apache.org/licenses/LICENSE-2.0
 *
 * Unless required by applicable law or agreed to in writing, software
 * distributed under the License is distributed on an "AS IS" BASIS,
 * WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 * See the License for the specific language governing permissions and
 * limitations under the License.
 *
 */

//!
//! ioctl request codes and payload structs for the vd628x character device
//!
//! Mirrors `vd628x_adapter_ioctl.h`'s three operations: `VD628x_IOCTL_GET_SPI_INFO`
//! (`_IOWR('r', 0x01, struct vd628x_spi_info)`), `VD628x_IOCTL_SET_SPI_PARAMS`
//! (`_IOW('r', 0x02, struct vd628x_spi_params)`), and
//! `VD628x_IOCTL_GET_CHUNK_SAMPLES` (`_IOWR('r', 0x03, __u16)`, whose real transfer
//! length is a runtime value, not the dummy `__u16` used only to encode the request).

use std::os::unix::io::RawFd;

use nix::libc;

/// `struct vd628x_spi_info` — chunk size and maximum bus frequency reported at open
#[repr(C)]
#[derive(Debug, Default, Clone, Copy)]
pub struct SpiInfo {
    pub chunk_size: u32,
    pub spi_max_frequency: u32,
}

/// `struct vd628x_spi_params` — pushed to the device by `set_params`
#[repr(C)]
#[derive(Debug, Default, Clone, Copy)]
pub struct SpiParams {
    pub speed_hz: u32,
    pub samples_nb_per_chunk: u16,
    pub pdm_data_sample_width_in_bytes: u16,
}

nix::ioctl_readwrite!(get_spi_info, b'r', 0x01, SpiInfo);
nix::ioctl_write_ptr!(set_spi_params, b'r', 0x02, SpiParams);

/// `GET_CHUNK_SAMPLES` has a variable-length transfer (`samples_per_chunk * i16`), so
/// the request code is built by hand from the same `(_IOWR, 'r', 0x03, size_of::<u16>())`
/// triple the original dummy `__u16` type encodes, and the actual buffer pointer is
/// passed through a raw `libc::ioctl` call rather than one of nix's typed macros.
const GET_CHUNK_SAMPLES_NR: u8 = 0x03;

fn get_chunk_samples_request() -> nix::sys::ioctl::ioctl_num_type {
    nix::request_code_readwrite!(b'r', GET_CHUNK_SAMPLES_NR, std::mem::size_of::<u16>())
}

/// Issues `GET_CHUNK_SAMPLES`, writing `len` i16 samples starting at `buf`. Blocks
/// until the device has a chunk ready.
///
/// # Safety
/// `buf` must be valid for `len` writes of `i16`.
pub unsafe fn get_chunk_samples(fd: RawFd, buf: *mut i16, len: usize) -> nix::Result<()> {
    let _ = len;
    let res = libc::ioctl(fd, get_chunk_samples_request() as libc::c_ulong, buf);
    if res < 0 {
        Err(nix::Error::Sys(nix::errno::Errno::last()))
    } else {
        Ok(())
    }
}
