use byteorder::{ByteOrder, ReadBytesExt, WriteBytesExt, LE};

/// Little-endian accessors for target memory
pub trait ProcessExt {
    fn read_u8(&self, address: u32) -> Result<u8, super::Error>;
    fn read_u16(&self, address: u32) -> Result<u16, super::Error>;
    fn read_u32(&self, address: u32) -> Result<u32, super::Error>;
    fn read_len(&self, address: u32, len: usize) -> Result<Vec<u8>, super::Error>;
    fn write_u32(&mut self, address: u32, value: u32) -> Result<(), super::Error>;
}

impl<P: super::Process + ?Sized> ProcessExt for P {
    fn read_u8(&self, address: u32) -> Result<u8, super::Error> {
        let mut buf = [0; 1];
        self.read(address, &mut buf)?;
        Ok(buf[0])
    }

    fn read_u16(&self, address: u32) -> Result<u16, super::Error> {
        let mut buf = [0; 2];
        self.read(address, &mut buf)?;
        Ok(LE::read_u16(&buf))
    }

    fn read_u32(&self, address: u32) -> Result<u32, super::Error> {
        let mut buf = [0; 4];
        self.read(address, &mut buf)?;
        Ok(LE::read_u32(&buf))
    }

    fn read_len(&self, address: u32, len: usize) -> Result<Vec<u8>, super::Error> {
        let mut buf = vec![0; len];
        self.read(address, &mut buf)?;
        Ok(buf)
    }

    fn write_u32(&mut self, address: u32, value: u32) -> Result<(), super::Error> {
        self.write(address, &value.to_le_bytes())
    }
}

pub(crate) trait ReadExt {
    fn read_digits(&mut self, len: usize) -> Result<Vec<u32>, super::Error>;
}

pub(crate) trait WriteExt {
    fn write_digits(&mut self, digits: &[u32]) -> Result<(), super::Error>;
}

impl<R: std::io::Read> ReadExt for R {
    fn read_digits(&mut self, len: usize) -> Result<Vec<u32>, super::Error> {
        let mut buf = vec![0; len];
        self.read_u32_into::<LE>(&mut buf)?;
        Ok(buf)
    }
}

impl<W: std::io::Write> WriteExt for W {
    fn write_digits(&mut self, digits: &[u32]) -> Result<(), super::Error> {
        for digit in digits {
            self.write_u32::<LE>(*digit)?;
        }
        Ok(())
    }
}
