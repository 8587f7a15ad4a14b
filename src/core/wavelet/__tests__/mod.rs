mod dwt_image_test;
