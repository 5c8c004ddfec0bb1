use std::io;

pub trait UnicodeWrite {
    fn write_all(&mut self, s: &str) -> io::Result<()>;
}

impl UnicodeWrite for &mut String {
    fn write_all(&mut self, s: &str) -> io::Result<()> {
        self.push_str(s);
        Ok(())
    }
}

impl<T: ?Sized + UnicodeWrite> UnicodeWrite for &mut T {
    fn write_all(&mut self, s: &str) -> io::Result<()> {
        (**self).write_all(s)
    }
}
