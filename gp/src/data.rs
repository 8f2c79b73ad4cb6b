use crate::errors::{GpError, Result};
use csv::ReaderBuilder;
use linfa::Float;
use ndarray::{s, Array1, Array2};
use ndarray_csv::Array2Reader;
use serde::de::DeserializeOwned;
use std::fs::File;
use std::path::{Path, PathBuf};

/// Training or test samples loaded from a delimited text file.
///
/// Each row holds `n_regressors` input values followed by the output value.
#[derive(Clone, Debug)]
pub struct GpData<F: Float> {
    file_path: PathBuf,
    n_samples: usize,
    n_regressors: usize,
    input: Array2<F>,
    output: Array1<F>,
}

impl<F: Float + DeserializeOwned> GpData<F> {
    /// Load the first `n_samples` rows of the comma separated file at `path`
    pub fn from_file<P: AsRef<Path>>(path: P, n_samples: usize, n_regressors: usize) -> Result<Self> {
        Self::from_file_with_delimiter(path, n_samples, n_regressors, b',')
    }

    /// Load the first `n_samples` rows of the file at `path` given the field `delimiter`
    pub fn from_file_with_delimiter<P: AsRef<Path>>(
        path: P,
        n_samples: usize,
        n_regressors: usize,
        delimiter: u8,
    ) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)?;
        let mut reader = ReaderBuilder::new()
            .has_headers(false)
            .delimiter(delimiter)
            .from_reader(file);
        let data: Array2<F> = reader
            .deserialize_array2_dynamic()
            .map_err(|err| GpError::LoadError(format!("{}: {}", path.display(), err)))?;

        if data.ncols() != n_regressors + 1 {
            return Err(GpError::LoadError(format!(
                "{}: expected {} columns ({} regressors and the output), got {}",
                path.display(),
                n_regressors + 1,
                n_regressors,
                data.ncols()
            )));
        }
        if data.nrows() < n_samples {
            return Err(GpError::LoadError(format!(
                "{}: {} samples requested, only {} available",
                path.display(),
                n_samples,
                data.nrows()
            )));
        }
        Ok(GpData {
            file_path: path.to_path_buf(),
            n_samples,
            n_regressors,
            input: data.slice(s![..n_samples, ..n_regressors]).to_owned(),
            output: data.slice(s![..n_samples, n_regressors]).to_owned(),
        })
    }
}

impl<F: Float> GpData<F> {
    /// Path of the loaded file
    pub fn file_path(&self) -> &Path {
        &self.file_path
    }

    /// Number of loaded samples
    pub fn n_samples(&self) -> usize {
        self.n_samples
    }

    /// Dimension of the input samples
    pub fn n_regressors(&self) -> usize {
        self.n_regressors
    }

    /// Input samples, one per row
    pub fn input(&self) -> &Array2<F> {
        &self.input
    }

    /// Output values
    pub fn output(&self) -> &Array1<F> {
        &self.output
    }

    /// Input and output arrays
    pub fn into_arrays(self) -> (Array2<F>, Array1<F>) {
        (self.input, self.output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ErrorKind;
    use ndarray::array;
    use std::fs;
    use std::io::Write;

    fn write_file(name: &str, content: &str) -> PathBuf {
        let test_dir = "target/tests";
        fs::create_dir_all(test_dir).ok();
        let path = Path::new(test_dir).join(name);
        let mut file = File::create(&path).unwrap();
        file.write_all(content.as_bytes()).unwrap();
        path
    }

    #[test]
    fn test_load_data() {
        let path = write_file("data_ok.csv", "0.,1.,2.\n1.,0.5,3.\n2.,0.,4.\n");
        let data: GpData<f64> = GpData::from_file(&path, 2, 2).unwrap();
        assert_eq!(data.input(), &array![[0., 1.], [1., 0.5]]);
        assert_eq!(data.output(), &array![2., 3.]);
        assert_eq!(data.n_samples(), 2);
        assert_eq!(data.n_regressors(), 2);
        assert_eq!(data.file_path(), path.as_path());
    }

    #[test]
    fn test_load_data_with_delimiter() {
        let path = write_file("data_semicolon.csv", "0.5;1.\n1.5;-1.\n");
        let (input, output) = GpData::<f64>::from_file_with_delimiter(&path, 2, 1, b';')
            .unwrap()
            .into_arrays();
        assert_eq!(input, array![[0.5], [1.5]]);
        assert_eq!(output, array![1., -1.]);
    }

    #[test]
    fn test_load_errors() {
        let err = GpData::<f64>::from_file("target/tests/missing.csv", 2, 1).unwrap_err();
        assert!(matches!(err, GpError::LoadIoError(_)));
        assert_eq!(err.kind(), ErrorKind::Io);

        let path = write_file("data_short.csv", "0.,1.\n1.,2.\n");
        assert!(matches!(
            GpData::<f64>::from_file(&path, 3, 1),
            Err(GpError::LoadError(_))
        ));
        assert!(matches!(
            GpData::<f64>::from_file(&path, 2, 2),
            Err(GpError::LoadError(_))
        ));

        let path = write_file("data_bad.csv", "0.,1.\n1.,abc\n");
        assert!(matches!(
            GpData::<f64>::from_file(&path, 2, 1),
            Err(GpError::LoadError(_))
        ));
    }
}
