use marpii::{ash::vk, context::Device};

///Default bump-allocator block size. Draw contexts use a larger block since per-frame draw
///streams tend to be the largest indirect recordings.
pub const DEFAULT_BLOCK_SIZE: usize = 4 * 1024;
pub const DRAW_BLOCK_SIZE: usize = 64 * 1024;

///Every command struct is padded to this alignment, matching the widest field (a Vulkan
///handle / u64) any command carries.
pub(crate) const RECORD_ALIGNMENT: usize = 8;

pub(crate) fn align_up(value: usize, align: usize) -> usize {
    (value + align - 1) & !(align - 1)
}

#[repr(C)]
#[derive(Clone, Copy, Debug)]
pub struct CommandHeader {
    pub command_id: u16,
    pub size_in_bytes: u16,
}

pub(crate) const HEADER_SIZE: usize = core::mem::size_of::<CommandHeader>();

struct Block {
    data: Box<[u8]>,
    used: usize,
}

impl Block {
    fn new(size: usize) -> Self {
        Block {
            data: vec![0u8; size].into_boxed_slice(),
            used: 0,
        }
    }

    fn try_alloc(&mut self, size: usize) -> Option<*mut u8> {
        let start = align_up(self.used, RECORD_ALIGNMENT);
        if start + size > self.data.len() {
            return None;
        }
        self.used = start + size;
        Some(unsafe { self.data.as_mut_ptr().add(start) })
    }
}

///Bump allocator backing one indirect command stream. `create_cmd`-style helpers in
///[crate::encode::catalogue] write directly through the pointer this returns; blocks fall
///forward when a record doesn't fit the remaining space in the current one.
pub struct CommandEncoder {
    block_size: usize,
    blocks: Vec<Block>,
}

impl CommandEncoder {
    pub fn new(block_size: usize) -> Self {
        CommandEncoder {
            block_size,
            blocks: vec![Block::new(block_size)],
        }
    }

    ///Allocates a record of `payload_size` bytes (header included) tagged with
    ///`command_id`, writes the header, and returns a pointer to the start of the record.
    ///`payload_size` is padded up to [RECORD_ALIGNMENT] before being stored as the header's
    ///`size_in_bytes`; callers must only write within the unpadded length they requested.
    pub fn alloc_record(&mut self, command_id: u16, payload_size: usize) -> *mut u8 {
        let total = align_up(payload_size, RECORD_ALIGNMENT);
        assert!(total <= u16::MAX as usize, "command record exceeds the u16 size bound");

        let ptr = match self.blocks.last_mut().unwrap().try_alloc(total) {
            Some(p) => p,
            None => {
                self.blocks.push(Block::new(self.block_size.max(total)));
                self.blocks
                    .last_mut()
                    .unwrap()
                    .try_alloc(total)
                    .expect("freshly allocated block smaller than the record it was sized for")
            }
        };

        unsafe {
            let header = ptr as *mut CommandHeader;
            (*header).command_id = command_id;
            (*header).size_in_bytes = total as u16;
        }
        ptr
    }

    ///Copies every block into one owned buffer in encoding order and pairs it with
    ///`execute`, releasing the encoder's arena.
    pub fn prepare(self, execute: ExecuteFn) -> BakedCommands {
        let total: usize = self.blocks.iter().map(|b| b.used).sum();
        let mut buffer = Vec::with_capacity(total);
        for block in &self.blocks {
            buffer.extend_from_slice(&block.data[..block.used]);
        }
        BakedCommands {
            buffer: buffer.into_boxed_slice(),
            execute,
        }
    }
}

pub type ExecuteFn = fn(&Device, vk::CommandBuffer, &[u8]);

///A finalised, self-describing byte buffer plus the function pointer that replays it.
///Ownership is unique and moves through the task -> batch chain until `execute` runs once,
///at submit time.
pub struct BakedCommands {
    buffer: Box<[u8]>,
    execute: ExecuteFn,
}

impl BakedCommands {
    pub fn execute(&self, device: &Device, cmd: vk::CommandBuffer) {
        (self.execute)(device, cmd, &self.buffer);
    }

    pub fn byte_len(&self) -> usize {
        self.buffer.len()
    }

    #[cfg(test)]
    pub(crate) fn as_bytes_for_test(&self) -> &[u8] {
        &self.buffer
    }
}

//Raw vk handles inside the buffer are Copy/Send-safe opaque integers; the buffer itself is
//never mutated after `prepare`.
unsafe impl Send for BakedCommands {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn falls_forward_to_a_new_block_on_overflow() {
        let mut enc = CommandEncoder::new(64);
        //first record fits, second doesn't: must allocate a new block rather than panic.
        enc.alloc_record(1, 32);
        enc.alloc_record(2, 48);
        assert_eq!(enc.blocks.len(), 2);
    }
}
